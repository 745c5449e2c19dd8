// ABOUTME: Fleet configuration - agent roster, budget limits, runner timing, recovery policy.
// ABOUTME: Validated once at fleet start; malformed weights or non-positive limits abort startup.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ConfigError;
use crate::strategy::{CampaignObjective, StrategyConfig};

/// Opaque identifier for one agent in the fleet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a random agent id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Voice a persona writes in. Biases the action-kind distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaTone {
    #[default]
    Casual,
    Assertive,
    Reserved,
}

/// Persona assigned to an agent, handed to the content generator and used
/// by the strategy engine for flavor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    /// Short label identifying the persona configuration, e.g. "local-parent".
    pub tag: String,
    #[serde(default)]
    pub tone: PersonaTone,
}

impl Persona {
    pub fn new(tag: impl Into<String>, tone: PersonaTone) -> Self {
        Self {
            tag: tag.into(),
            tone,
        }
    }
}

/// One agent in the fleet roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub id: AgentId,
    pub persona: Persona,
}

impl AgentSpec {
    /// Create a roster entry with a generated id.
    pub fn new(persona: Persona) -> Self {
        Self {
            id: AgentId::generate(),
            persona,
        }
    }

    pub fn with_id(id: AgentId, persona: Persona) -> Self {
        Self { id, persona }
    }
}

/// Sliding-window rate limit for one budget scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Maximum actions inside the window.
    pub limit: u32,
    pub window: Duration,
}

impl WindowConfig {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }
}

/// Adaptive backoff applied to a scope after platform rate-limit feedback.
///
/// Consecutive rate limits escalate the denial window exponentially from
/// `base` up to `max`; `decay_streak` clean successes step the escalation
/// level back down one notch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackoffConfig {
    pub base: Duration,
    pub multiplier: f64,
    pub max: Duration,
    pub decay_streak: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(30),
            multiplier: 2.0,
            max: Duration::from_secs(300),
            decay_streak: 10,
        }
    }
}

/// Budget limits for the whole fleet and for each agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Fleet-wide window. `None` leaves the global scope without an
    /// occupancy cap; platform backoff still applies to it.
    pub global: Option<WindowConfig>,
    pub per_agent: WindowConfig,
    #[serde(default)]
    pub backoff: BackoffConfig,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            global: Some(WindowConfig::new(8, Duration::from_secs(60))),
            per_agent: WindowConfig::new(3, Duration::from_secs(60)),
            backoff: BackoffConfig::default(),
        }
    }
}

/// Engagement saturation limits for targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Maximum fleet engagements per target inside the rolling window.
    pub engagement_cap: u32,
    pub window: Duration,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            engagement_cap: 3,
            window: Duration::from_secs(900),
        }
    }
}

/// Timing and resilience knobs for each agent's control loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Bounds for the jittered idle interval between cycles.
    pub cycle_min: Duration,
    pub cycle_max: Duration,
    /// Retries of a denied proposal before it is dropped.
    pub denial_retry_ceiling: u32,
    /// Upper bound on a single denial-driven sleep.
    pub max_denial_backoff: Duration,
    /// Consecutive transport/auth failures before suspension.
    pub failure_ceiling: u32,
    pub cooldown_base: Duration,
    pub cooldown_max: Duration,
    /// Bound on a content-generation call; expiry counts as a transport failure.
    pub content_timeout: Duration,
    /// Bound on a platform action; expiry counts as a transport failure.
    pub action_timeout: Duration,
    /// Campaign runtime after which the strategy shifts out of audience building.
    pub audience_phase: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            cycle_min: Duration::from_secs(300),
            cycle_max: Duration::from_secs(1800),
            denial_retry_ceiling: 3,
            max_denial_backoff: Duration::from_secs(120),
            failure_ceiling: 5,
            cooldown_base: Duration::from_secs(60),
            cooldown_max: Duration::from_secs(900),
            content_timeout: Duration::from_secs(30),
            action_timeout: Duration::from_secs(30),
            audience_phase: Duration::from_secs(2 * 24 * 3600),
        }
    }
}

/// How the coordinator treats suspended agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RecoveryPolicy {
    /// Leave suspended agents alone until externally reset.
    #[default]
    Manual,
    /// Clear the failure counter and wake the agent after `cooldown`.
    AutoResume { cooldown: Duration },
}

fn default_monitor_interval() -> Duration {
    Duration::from_secs(5)
}

/// Complete configuration for one fleet run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetConfig {
    pub agents: Vec<AgentSpec>,
    pub objective: CampaignObjective,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub targets: TargetConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub recovery: RecoveryPolicy,
    /// Cadence of the coordinator's health monitor.
    #[serde(default = "default_monitor_interval")]
    pub monitor_interval: Duration,
}

impl FleetConfig {
    /// Create a config with an empty roster and defaults everywhere else.
    pub fn new(objective: CampaignObjective) -> Self {
        Self {
            agents: Vec::new(),
            objective,
            budget: BudgetConfig::default(),
            targets: TargetConfig::default(),
            runner: RunnerConfig::default(),
            strategy: StrategyConfig::default(),
            recovery: RecoveryPolicy::default(),
            monitor_interval: default_monitor_interval(),
        }
    }

    /// Add one agent to the roster.
    pub fn agent(mut self, spec: AgentSpec) -> Self {
        self.agents.push(spec);
        self
    }

    pub fn budget(mut self, budget: BudgetConfig) -> Self {
        self.budget = budget;
        self
    }

    pub fn targets(mut self, targets: TargetConfig) -> Self {
        self.targets = targets;
        self
    }

    pub fn runner(mut self, runner: RunnerConfig) -> Self {
        self.runner = runner;
        self
    }

    pub fn strategy(mut self, strategy: StrategyConfig) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn recovery(mut self, recovery: RecoveryPolicy) -> Self {
        self.recovery = recovery;
        self
    }

    pub fn monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval;
        self
    }

    /// Parse a config from JSON.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(|e| ConfigError::Malformed(e.to_string()))
    }

    /// Check the whole configuration. Called by the coordinator before any
    /// runner is spawned; failure here aborts fleet start.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agents.is_empty() {
            return Err(ConfigError::NoAgents);
        }
        let mut seen = HashSet::new();
        for spec in &self.agents {
            if !seen.insert(&spec.id) {
                return Err(ConfigError::DuplicateAgent(spec.id.as_str().to_string()));
            }
        }

        self.objective.validate()?;

        validate_window(&self.budget.per_agent, "per-agent limit", "per-agent window")?;
        if let Some(global) = &self.budget.global {
            validate_window(global, "global limit", "global window")?;
        }

        let backoff = &self.budget.backoff;
        if backoff.base.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: "backoff base",
            });
        }
        if !(backoff.multiplier >= 1.0) {
            return Err(ConfigError::BackoffMultiplier(backoff.multiplier));
        }
        if backoff.max < backoff.base {
            return Err(ConfigError::BackoffCapBelowBase {
                base: backoff.base,
                max: backoff.max,
            });
        }
        if backoff.decay_streak == 0 {
            return Err(ConfigError::NonPositiveLimit {
                field: "backoff decay streak",
            });
        }

        validate_window(
            &WindowConfig::new(self.targets.engagement_cap, self.targets.window),
            "target engagement cap",
            "target window",
        )?;

        let runner = &self.runner;
        if runner.cycle_min > runner.cycle_max {
            return Err(ConfigError::InvertedInterval {
                min: runner.cycle_min,
                max: runner.cycle_max,
            });
        }
        if runner.failure_ceiling == 0 {
            return Err(ConfigError::NonPositiveLimit {
                field: "failure ceiling",
            });
        }
        for (duration, field) in [
            (runner.cooldown_base, "failure cooldown base"),
            (runner.content_timeout, "content timeout"),
            (runner.action_timeout, "action timeout"),
            (self.monitor_interval, "monitor interval"),
        ] {
            if duration.is_zero() {
                return Err(ConfigError::ZeroDuration { field });
            }
        }
        if self.strategy.max_post_length == 0 {
            return Err(ConfigError::NonPositiveLimit {
                field: "max post length",
            });
        }

        Ok(())
    }
}

fn validate_window(
    window: &WindowConfig,
    limit_field: &'static str,
    window_field: &'static str,
) -> Result<(), ConfigError> {
    if window.limit == 0 {
        return Err(ConfigError::NonPositiveLimit { field: limit_field });
    }
    if window.window.is_zero() {
        return Err(ConfigError::ZeroDuration {
            field: window_field,
        });
    }
    Ok(())
}
