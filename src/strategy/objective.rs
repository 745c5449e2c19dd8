// ABOUTME: Campaign objective weights, the closed action-kind set, and content-request parameters.
// ABOUTME: Closed tagged variants keep the strategy decision table exhaustively testable.

use serde::{Deserialize, Serialize};

use crate::config::Persona;
use crate::error::ConfigError;

/// The closed set of platform actions an agent can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// An original post, optionally riding a trend.
    Post,
    /// A reply into an existing conversation.
    Reply,
    /// A like-equivalent on aligned content.
    Endorse,
    /// A repost of aligned content.
    Boost,
}

impl ActionKind {
    /// Whether this action carries generated text.
    pub fn needs_content(&self) -> bool {
        matches!(self, ActionKind::Post | ActionKind::Reply)
    }

    /// Whether this action is meaningless without a target.
    pub fn requires_target(&self) -> bool {
        !matches!(self, ActionKind::Post)
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKind::Post => write!(f, "post"),
            ActionKind::Reply => write!(f, "reply"),
            ActionKind::Endorse => write!(f, "endorse"),
            ActionKind::Boost => write!(f, "boost"),
        }
    }
}

/// Messaging categories a campaign can weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageCategory {
    /// Original content pushing the campaign line.
    Advocacy,
    /// Contesting opposing conversations.
    Rebuttal,
    /// Lifting aligned content that already exists.
    Amplification,
    /// Non-targeted community content that builds an audience.
    Community,
}

impl std::fmt::Display for MessageCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageCategory::Advocacy => write!(f, "advocacy"),
            MessageCategory::Rebuttal => write!(f, "rebuttal"),
            MessageCategory::Amplification => write!(f, "amplification"),
            MessageCategory::Community => write!(f, "community"),
        }
    }
}

/// Relative emphasis the campaign places on each messaging category.
///
/// Immutable for a run. The strategy engine derives its action-kind
/// distribution from these weights plus the agent's persona and the
/// campaign phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CampaignObjective {
    pub advocacy: f64,
    pub rebuttal: f64,
    pub amplification: f64,
    pub community: f64,
}

impl CampaignObjective {
    /// Even-handed default mix.
    pub fn balanced() -> Self {
        Self {
            advocacy: 0.4,
            rebuttal: 0.3,
            amplification: 0.2,
            community: 0.1,
        }
    }

    /// Mix favoring original content over engagement.
    pub fn advocacy_led() -> Self {
        Self {
            advocacy: 0.5,
            rebuttal: 0.2,
            amplification: 0.2,
            community: 0.1,
        }
    }

    /// Mix favoring reactive engagement in existing conversations.
    pub fn engagement_led() -> Self {
        Self {
            advocacy: 0.25,
            rebuttal: 0.45,
            amplification: 0.2,
            community: 0.1,
        }
    }

    pub(crate) fn entries(&self) -> [(MessageCategory, f64); 4] {
        [
            (MessageCategory::Advocacy, self.advocacy),
            (MessageCategory::Rebuttal, self.rebuttal),
            (MessageCategory::Amplification, self.amplification),
            (MessageCategory::Community, self.community),
        ]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut total = 0.0;
        for (category, weight) in self.entries() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::InvalidWeight {
                    category: category_name(category),
                    value: weight,
                });
            }
            total += weight;
        }
        if total <= 0.0 {
            return Err(ConfigError::DegenerateWeights);
        }
        Ok(())
    }
}

impl Default for CampaignObjective {
    fn default() -> Self {
        Self::balanced()
    }
}

fn category_name(category: MessageCategory) -> &'static str {
    match category {
        MessageCategory::Advocacy => "advocacy",
        MessageCategory::Rebuttal => "rebuttal",
        MessageCategory::Amplification => "amplification",
        MessageCategory::Community => "community",
    }
}

/// Parameters handed to the external content generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRequest {
    pub category: MessageCategory,
    pub persona: Persona,
    /// Topic or conversation the text should anchor on, when targeted.
    pub topic: Option<String>,
    /// Platform length constraint the generated text must respect.
    pub max_length: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_objective_validates() {
        assert!(CampaignObjective::balanced().validate().is_ok());
        assert!(CampaignObjective::advocacy_led().validate().is_ok());
        assert!(CampaignObjective::engagement_led().validate().is_ok());
    }

    #[test]
    fn test_negative_weight_rejected() {
        let objective = CampaignObjective {
            rebuttal: -0.1,
            ..CampaignObjective::balanced()
        };
        assert!(matches!(
            objective.validate(),
            Err(ConfigError::InvalidWeight {
                category: "rebuttal",
                ..
            })
        ));
    }

    #[test]
    fn test_all_zero_weights_rejected() {
        let objective = CampaignObjective {
            advocacy: 0.0,
            rebuttal: 0.0,
            amplification: 0.0,
            community: 0.0,
        };
        assert!(matches!(
            objective.validate(),
            Err(ConfigError::DegenerateWeights)
        ));
    }

    #[test]
    fn test_only_posts_carry_content() {
        assert!(ActionKind::Post.needs_content());
        assert!(ActionKind::Reply.needs_content());
        assert!(!ActionKind::Endorse.needs_content());
        assert!(!ActionKind::Boost.needs_content());
    }

    #[test]
    fn test_post_is_the_only_untargeted_kind() {
        assert!(!ActionKind::Post.requires_target());
        assert!(ActionKind::Reply.requires_target());
        assert!(ActionKind::Endorse.requires_target());
        assert!(ActionKind::Boost.requires_target());
    }
}
