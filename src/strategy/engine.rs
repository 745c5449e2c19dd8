// ABOUTME: The strategy engine - turns objective weights, persona, and intelligence into one proposal.
// ABOUTME: Seeded sampling, saturation-aware targeting, and total degradation to non-targeted posts.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::Persona;
use crate::platform::IntelligenceSnapshot;
use crate::registry::{Candidate, TargetCategory, TargetRegistry};

use super::objective::{ActionKind, CampaignObjective, ContentRequest, MessageCategory};

/// Where the campaign is in its lifecycle.
///
/// Early on the fleet builds an audience with non-targeted persona content;
/// later it shifts weight onto the campaign line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignPhase {
    AudienceBuilding,
    Influence,
}

/// Knobs for the strategy engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Snapshots older than this are treated as "no targeted opportunity".
    pub snapshot_max_age: Duration,
    /// Platform length constraint passed through to the content generator.
    pub max_post_length: usize,
    /// Seed for the sampler; random when unset.
    pub seed: Option<u64>,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            snapshot_max_age: Duration::from_secs(300),
            max_post_length: 280,
            seed: None,
        }
    }
}

/// A fully-specified candidate action awaiting budget approval and execution.
///
/// Produced by the engine, consumed exactly once by one agent runner. The
/// priority score is telemetry only; runners never order work across agents.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionProposal {
    pub kind: ActionKind,
    pub target: Option<Candidate>,
    pub content: ContentRequest,
    pub priority: f64,
}

/// Maps environmental intelligence, the campaign objective, and target
/// history into a ranked action proposal for a requesting agent.
///
/// The engine is a pure decision function: it performs no network calls and
/// consumes no rate budget, and given a seed it is deterministic over its
/// inputs and the registry state, so it can be fuzzed without any I/O.
pub struct StrategyEngine {
    objective: CampaignObjective,
    registry: Arc<TargetRegistry>,
    config: StrategyConfig,
    rng: Mutex<StdRng>,
}

impl StrategyEngine {
    pub fn new(
        objective: CampaignObjective,
        registry: Arc<TargetRegistry>,
        config: StrategyConfig,
    ) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            objective,
            registry,
            config,
            rng: Mutex::new(rng),
        }
    }

    /// Decide the next action for an agent.
    ///
    /// Never fails: when the sampled kind needs a target and none survives
    /// saturation filtering (or the snapshot is stale or empty), the proposal
    /// degrades to a non-targeted audience-building post.
    pub async fn propose(
        &self,
        persona: &Persona,
        snapshot: &IntelligenceSnapshot,
        phase: CampaignPhase,
        now: Instant,
    ) -> ActionProposal {
        let entries = self.category_weights(persona, phase);
        let total: f64 = entries.iter().map(|(_, w)| *w).sum();
        let (category, endorse_coin) = {
            let mut rng = self.rng.lock().unwrap();
            (sample_category(&entries, total, &mut rng), rng.random_bool(0.5))
        };
        let kind = match category {
            MessageCategory::Advocacy | MessageCategory::Community => ActionKind::Post,
            MessageCategory::Rebuttal => ActionKind::Reply,
            MessageCategory::Amplification => {
                if endorse_coin {
                    ActionKind::Endorse
                } else {
                    ActionKind::Boost
                }
            }
        };
        let share = if total > 0.0 {
            weight_of(&entries, category) / total
        } else {
            1.0
        };

        let candidates: &[Candidate] = if snapshot.age(now) <= self.config.snapshot_max_age {
            &snapshot.candidates
        } else {
            &[]
        };

        if kind.requires_target() {
            match self.registry.pick_unsaturated(candidates, now).await {
                Some(target) => ActionProposal {
                    priority: share * target.score,
                    content: self.content_request(category, persona, Some(&target)),
                    target: Some(target),
                    kind,
                },
                None => self.degraded(persona),
            }
        } else {
            // Original posts ride an unsaturated trend when one is available.
            let trends: Vec<Candidate> = candidates
                .iter()
                .filter(|c| c.category == TargetCategory::Trend)
                .cloned()
                .collect();
            let target = self.registry.pick_unsaturated(&trends, now).await;
            ActionProposal {
                priority: share * target.as_ref().map(|t| t.score).unwrap_or(1.0),
                content: self.content_request(category, persona, target.as_ref()),
                target,
                kind,
            }
        }
    }

    /// Total degradation path: an untargeted community post.
    fn degraded(&self, persona: &Persona) -> ActionProposal {
        ActionProposal {
            kind: ActionKind::Post,
            target: None,
            content: self.content_request(MessageCategory::Community, persona, None),
            priority: 0.0,
        }
    }

    fn content_request(
        &self,
        category: MessageCategory,
        persona: &Persona,
        target: Option<&Candidate>,
    ) -> ContentRequest {
        ContentRequest {
            category,
            persona: persona.clone(),
            topic: target.map(|t| t.id.as_str().to_string()),
            max_length: self.config.max_post_length,
        }
    }

    fn category_weights(
        &self,
        persona: &Persona,
        phase: CampaignPhase,
    ) -> [(MessageCategory, f64); 4] {
        use crate::config::PersonaTone;

        let mut entries = self.objective.entries();
        for (category, weight) in entries.iter_mut() {
            *weight *= match (persona.tone, *category) {
                (PersonaTone::Assertive, MessageCategory::Rebuttal) => 1.3,
                (PersonaTone::Assertive, MessageCategory::Amplification) => 0.8,
                (PersonaTone::Reserved, MessageCategory::Rebuttal) => 0.6,
                (PersonaTone::Reserved, MessageCategory::Amplification) => 1.3,
                _ => 1.0,
            };
            if phase == CampaignPhase::AudienceBuilding {
                *weight *= match *category {
                    MessageCategory::Community => 4.0,
                    MessageCategory::Advocacy | MessageCategory::Rebuttal => 0.5,
                    MessageCategory::Amplification => 1.0,
                };
            }
        }
        entries
    }
}

fn sample_category(
    entries: &[(MessageCategory, f64); 4],
    total: f64,
    rng: &mut StdRng,
) -> MessageCategory {
    if total <= 0.0 {
        return MessageCategory::Community;
    }
    let mut roll = rng.random_range(0.0..total);
    for (category, weight) in entries {
        if roll < *weight {
            return *category;
        }
        roll -= *weight;
    }
    entries[entries.len() - 1].0
}

fn weight_of(entries: &[(MessageCategory, f64); 4], wanted: MessageCategory) -> f64 {
    entries
        .iter()
        .find(|entry| entry.0 == wanted)
        .map(|entry| entry.1)
        .unwrap_or(0.0)
}
