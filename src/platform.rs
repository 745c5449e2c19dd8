// ABOUTME: Narrow interfaces to the external collaborators: platform client, content generator, scanner feed.
// ABOUTME: The core consumes a four-way action outcome and never speaks the platform's wire protocol.

use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::registry::{Candidate, TargetId};
use crate::strategy::{ActionKind, ContentRequest};

/// Four-way outcome of a platform action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Success,
    /// The platform rejected the action for rate reasons, optionally hinting
    /// when to come back.
    RateLimited { retry_after: Option<Duration> },
    AuthFailure,
    TransportError,
}

impl std::fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionOutcome::Success => write!(f, "success"),
            ActionOutcome::RateLimited { .. } => write!(f, "rate limited"),
            ActionOutcome::AuthFailure => write!(f, "auth failure"),
            ActionOutcome::TransportError => write!(f, "transport error"),
        }
    }
}

/// One concrete action, ready for the platform client.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedAction {
    pub kind: ActionKind,
    pub target: Option<TargetId>,
    /// Generated text for kinds that carry content.
    pub body: Option<String>,
}

/// Read-only environmental intelligence supplied by an external scanner.
///
/// Refresh cadence is the scanner's business; the core only checks age. A
/// stale or empty snapshot means "no targeted opportunity", never an error.
#[derive(Debug, Clone)]
pub struct IntelligenceSnapshot {
    pub candidates: Vec<Candidate>,
    pub captured_at: Instant,
}

impl IntelligenceSnapshot {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates,
            captured_at: Instant::now(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.captured_at)
    }
}

/// Executes one action against the platform.
///
/// Implementations own credentials and the wire protocol and report platform
/// feedback through [`ActionOutcome`]. An `Err` from an implementation is
/// treated by the caller as a transport failure.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn execute(&self, action: &PreparedAction) -> Result<ActionOutcome, anyhow::Error>;
}

/// Produces post text for a content request.
///
/// The contract is non-empty text within the request's length constraint,
/// with any fallback handled inside the implementation; the call never fails
/// outward. Callers bound it with a timeout.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, request: &ContentRequest) -> String;
}

/// Hands out the most recent environmental snapshot.
pub trait IntelligenceFeed: Send + Sync {
    fn latest(&self) -> IntelligenceSnapshot;
}
