// ABOUTME: Defines all error types for the cadre library using thiserror.
// ABOUTME: Configuration problems are fatal at startup; runtime denials are first-class results, not errors.

use std::time::Duration;

/// Top-level error type for the cadre library.
#[derive(Debug, thiserror::Error)]
pub enum CadreError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fleet error: {0}")]
    Fleet(#[from] FleetError),
}

/// Errors detected while validating a fleet configuration.
///
/// Any of these aborts fleet start. Nothing here is tolerated at runtime:
/// once a fleet is running, budget denials and saturated targets are ordinary
/// results handled by the runners themselves.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("fleet roster is empty")]
    NoAgents,

    #[error("duplicate agent id '{0}' in roster")]
    DuplicateAgent(String),

    #[error("{field} must be positive")]
    NonPositiveLimit { field: &'static str },

    #[error("{field} must be a non-zero duration")]
    ZeroDuration { field: &'static str },

    #[error("backoff multiplier must be at least 1.0, got {0}")]
    BackoffMultiplier(f64),

    #[error("backoff maximum {max:?} is below the base {base:?}")]
    BackoffCapBelowBase { base: Duration, max: Duration },

    #[error("cycle interval is inverted: min {min:?} exceeds max {max:?}")]
    InvertedInterval { min: Duration, max: Duration },

    #[error("objective weight for {category} must be finite and non-negative, got {value}")]
    InvalidWeight { category: &'static str, value: f64 },

    #[error("objective weights must include at least one positive weight")]
    DegenerateWeights,

    #[error("malformed fleet config: {0}")]
    Malformed(String),
}

/// Errors from fleet lifecycle operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FleetError {
    #[error("fleet is already running")]
    AlreadyStarted,

    #[error("fleet has not been started")]
    NotStarted,
}
