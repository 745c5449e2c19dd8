// ABOUTME: Shared observable state for one agent - lifecycle, counters, suspension.
// ABOUTME: Atomic status for lock-free reads; Notify wakes a suspended runner on resume.

use std::sync::atomic::{AtomicU8, AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Notify;

use crate::config::{AgentId, Persona};

/// Lifecycle states for an agent runner.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Between cycles, waiting out the jitter interval.
    Idle = 0,
    /// Executing an action against the platform.
    Acting = 1,
    /// Sleeping out a denial or failure cooldown.
    Backoff = 2,
    /// Inert after repeated consecutive failures; reportable, externally resettable.
    Suspended = 3,
    /// The runner has exited.
    Retired = 4,
}

impl AgentState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => AgentState::Idle,
            1 => AgentState::Acting,
            2 => AgentState::Backoff,
            3 => AgentState::Suspended,
            _ => AgentState::Retired,
        }
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentState::Idle => write!(f, "idle"),
            AgentState::Acting => write!(f, "acting"),
            AgentState::Backoff => write!(f, "backoff"),
            AgentState::Suspended => write!(f, "suspended"),
            AgentState::Retired => write!(f, "retired"),
        }
    }
}

/// Shared view of one agent.
///
/// Owned by the runner for writes; the coordinator and any monitoring
/// surface read it concurrently. Status reads are lock-free.
pub struct AgentHandle {
    id: AgentId,
    persona: Persona,
    state: AtomicU8,
    consecutive_failures: AtomicU32,
    actions_executed: AtomicU64,
    denials: AtomicU64,
    rate_limited: AtomicU64,
    failures: AtomicU64,
    proposals_dropped: AtomicU64,
    last_action: Mutex<Option<Instant>>,
    suspended_at: Mutex<Option<Instant>>,
    resume: Notify,
}

impl AgentHandle {
    pub fn new(id: AgentId, persona: Persona) -> Self {
        Self {
            id,
            persona,
            state: AtomicU8::new(AgentState::Idle as u8),
            consecutive_failures: AtomicU32::new(0),
            actions_executed: AtomicU64::new(0),
            denials: AtomicU64::new(0),
            rate_limited: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            proposals_dropped: AtomicU64::new(0),
            last_action: Mutex::new(None),
            suspended_at: Mutex::new(None),
            resume: Notify::new(),
        }
    }

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn state(&self) -> AgentState {
        AgentState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    pub fn suspended_since(&self) -> Option<Instant> {
        *self.suspended_at.lock().unwrap()
    }

    /// Clear the failure counter and wake a suspended runner.
    ///
    /// Returns false (and does nothing) unless the agent is suspended. This
    /// is the external reset path used by the coordinator's recovery policy
    /// or by an operator.
    pub fn resume(&self) -> bool {
        if self.state() != AgentState::Suspended {
            return false;
        }
        self.consecutive_failures.store(0, Ordering::SeqCst);
        *self.suspended_at.lock().unwrap() = None;
        self.set_state(AgentState::Idle);
        self.resume.notify_one();
        true
    }

    /// Serializable per-agent report.
    pub fn status(&self) -> AgentStatus {
        let now = Instant::now();
        AgentStatus {
            id: self.id.as_str().to_string(),
            persona: self.persona.tag.clone(),
            state: self.state(),
            consecutive_failures: self.consecutive_failures(),
            actions_executed: self.actions_executed.load(Ordering::SeqCst),
            denials: self.denials.load(Ordering::SeqCst),
            rate_limited: self.rate_limited.load(Ordering::SeqCst),
            failures: self.failures.load(Ordering::SeqCst),
            proposals_dropped: self.proposals_dropped.load(Ordering::SeqCst),
            seconds_since_last_action: self
                .last_action
                .lock()
                .unwrap()
                .map(|at| now.saturating_duration_since(at).as_secs()),
        }
    }

    pub(crate) fn set_state(&self, state: AgentState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    pub(crate) fn record_success(&self, now: Instant) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
        self.actions_executed.fetch_add(1, Ordering::SeqCst);
        *self.last_action.lock().unwrap() = Some(now);
    }

    pub(crate) fn record_denial(&self) {
        self.denials.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_dropped(&self) {
        self.proposals_dropped.fetch_add(1, Ordering::SeqCst);
    }

    /// Count one transport/auth failure, returning the new consecutive total.
    pub(crate) fn record_failure(&self) -> u32 {
        self.failures.fetch_add(1, Ordering::SeqCst);
        self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn suspend(&self, now: Instant) {
        *self.suspended_at.lock().unwrap() = Some(now);
        self.set_state(AgentState::Suspended);
    }

    /// Wait until an external reset wakes this agent.
    pub(crate) async fn resumed(&self) {
        self.resume.notified().await;
    }
}

/// Serializable per-agent report for the fleet snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct AgentStatus {
    pub id: String,
    pub persona: String,
    pub state: AgentState,
    pub consecutive_failures: u32,
    pub actions_executed: u64,
    pub denials: u64,
    pub rate_limited: u64,
    pub failures: u64,
    pub proposals_dropped: u64,
    pub seconds_since_last_action: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PersonaTone;

    fn handle() -> AgentHandle {
        AgentHandle::new(
            AgentId::new("a-1"),
            Persona::new("tester", PersonaTone::Casual),
        )
    }

    #[test]
    fn test_new_handle_starts_idle() {
        let handle = handle();
        assert_eq!(handle.state(), AgentState::Idle);
        assert_eq!(handle.consecutive_failures(), 0);
    }

    #[test]
    fn test_success_resets_consecutive_failures() {
        let handle = handle();
        assert_eq!(handle.record_failure(), 1);
        assert_eq!(handle.record_failure(), 2);
        handle.record_success(Instant::now());
        assert_eq!(handle.consecutive_failures(), 0);
        // The lifetime failure total is untouched by resets.
        assert_eq!(handle.status().failures, 2);
    }

    #[test]
    fn test_resume_only_acts_on_suspended_agents() {
        let handle = handle();
        assert!(!handle.resume());

        handle.record_failure();
        handle.suspend(Instant::now());
        assert_eq!(handle.state(), AgentState::Suspended);
        assert!(handle.suspended_since().is_some());

        assert!(handle.resume());
        assert_eq!(handle.state(), AgentState::Idle);
        assert_eq!(handle.consecutive_failures(), 0);
        assert!(handle.suspended_since().is_none());
    }
}
