// ABOUTME: The rate-budget ledger - single serialization point for all action-budget decisions.
// ABOUTME: Grants consume a slot in the global and per-agent window atomically; backoff adapts to 429s.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::{AgentId, AgentSpec, BackoffConfig, BudgetConfig, WindowConfig};
use crate::platform::ActionOutcome;

/// Why a grant was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// The whole fleet is inside a platform-imposed backoff window.
    GlobalBackoff,
    /// The fleet-wide window has no remaining slots.
    GlobalSaturated,
    /// This agent is inside a backoff window.
    AgentBackoff,
    /// This agent's own window has no remaining slots.
    AgentSaturated,
    /// No budget scope exists for this agent.
    UnknownAgent,
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenialReason::GlobalBackoff => write!(f, "global backoff"),
            DenialReason::GlobalSaturated => write!(f, "global window saturated"),
            DenialReason::AgentBackoff => write!(f, "agent backoff"),
            DenialReason::AgentSaturated => write!(f, "agent window saturated"),
            DenialReason::UnknownAgent => write!(f, "unknown agent"),
        }
    }
}

/// Result of asking the ledger for permission to act.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantDecision {
    /// A slot was consumed in every governing window; the caller may act.
    Granted,
    /// No slot. Retry no sooner than `retry_after`.
    Denied {
        reason: DenialReason,
        retry_after: Duration,
    },
}

impl GrantDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, GrantDecision::Granted)
    }
}

/// What the platform said about an attempted action, as the ledger sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Success,
    RateLimited { retry_after: Option<Duration> },
    /// Transport or auth failure. Leaves the consumed slot in place and
    /// resets the clean-success streak.
    Failure,
}

impl From<&ActionOutcome> for RecordOutcome {
    fn from(outcome: &ActionOutcome) -> Self {
        match outcome {
            ActionOutcome::Success => RecordOutcome::Success,
            ActionOutcome::RateLimited { retry_after } => RecordOutcome::RateLimited {
                retry_after: *retry_after,
            },
            ActionOutcome::AuthFailure | ActionOutcome::TransportError => RecordOutcome::Failure,
        }
    }
}

struct ScopeState {
    window: Option<WindowConfig>,
    stamps: VecDeque<Instant>,
    backoff_until: Option<Instant>,
    /// Escalation level: consecutive rate limits not yet decayed away.
    level: u32,
    clean_streak: u32,
    granted: u64,
    denied: u64,
}

impl ScopeState {
    fn new(window: Option<WindowConfig>) -> Self {
        Self {
            window,
            stamps: VecDeque::new(),
            backoff_until: None,
            level: 0,
            clean_streak: 0,
            granted: 0,
            denied: 0,
        }
    }

    /// Remaining backoff, clearing the marker once it has elapsed.
    fn backoff_wait(&mut self, now: Instant) -> Option<Duration> {
        match self.backoff_until {
            Some(until) if until > now => Some(until - now),
            Some(_) => {
                self.backoff_until = None;
                None
            }
            None => None,
        }
    }

    /// Wait until the oldest stamp leaves the window, if the window is full.
    fn occupancy_wait(&mut self, now: Instant) -> Option<Duration> {
        let config = self.window?;
        self.prune(now, config.window);
        if self.stamps.len() < config.limit as usize {
            return None;
        }
        let oldest = *self.stamps.front()?;
        Some((oldest + config.window).saturating_duration_since(now))
    }

    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(front) = self.stamps.front() {
            if now.saturating_duration_since(*front) >= window {
                self.stamps.pop_front();
            } else {
                break;
            }
        }
    }

    fn consume(&mut self, now: Instant) {
        if self.window.is_some() {
            self.stamps.push_back(now);
        }
        self.granted += 1;
    }

    /// Escalate backoff after a platform rate limit, honoring a longer
    /// server hint when one is given.
    fn escalate(&mut self, now: Instant, hint: Option<Duration>, backoff: &BackoffConfig) {
        self.level = self.level.saturating_add(1);
        self.clean_streak = 0;
        let exponent = (self.level - 1).min(63) as i32;
        let raw = backoff.base.as_secs_f64() * backoff.multiplier.powi(exponent);
        let mut delay = Duration::from_secs_f64(raw.min(backoff.max.as_secs_f64()));
        if let Some(hint) = hint {
            delay = delay.max(hint);
        }
        let until = now + delay;
        self.backoff_until = Some(match self.backoff_until {
            Some(existing) => existing.max(until),
            None => until,
        });
    }

    /// A clean success; a sustained streak steps the escalation level down.
    fn settle(&mut self, backoff: &BackoffConfig) {
        if self.level == 0 {
            return;
        }
        self.clean_streak += 1;
        if self.clean_streak >= backoff.decay_streak {
            self.level -= 1;
            self.clean_streak = 0;
        }
    }

    fn status(&self, now: Instant) -> ScopeStatus {
        ScopeStatus {
            limit: self.window.map(|w| w.limit),
            in_window: self
                .stamps
                .iter()
                .filter(|stamp| match self.window {
                    Some(w) => now.saturating_duration_since(**stamp) < w.window,
                    None => false,
                })
                .count(),
            backoff_level: self.level,
            backoff_remaining_ms: self
                .backoff_until
                .filter(|until| *until > now)
                .map(|until| (until - now).as_millis() as u64),
            granted: self.granted,
            denied: self.denied,
        }
    }
}

/// Point-in-time view of one scope, for telemetry.
#[derive(Debug, Clone, Serialize)]
pub struct ScopeStatus {
    pub limit: Option<u32>,
    pub in_window: usize,
    pub backoff_level: u32,
    pub backoff_remaining_ms: Option<u64>,
    pub granted: u64,
    pub denied: u64,
}

/// Point-in-time view of the whole ledger.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerStatus {
    pub global: ScopeStatus,
    pub agents: HashMap<String, ScopeStatus>,
}

struct LedgerState {
    global: ScopeState,
    agents: HashMap<AgentId, ScopeState>,
}

/// Tracks remaining action allowance per agent and fleet-wide.
///
/// All mutation is serialized behind one mutex, so two agents can never both
/// observe headroom and both consume the last slot: the grant itself consumes
/// a slot in the global and per-agent windows, making grant-then-record
/// atomic from each scope's point of view. `record` only adapts backoff.
///
/// `try_grant` evaluates global backoff and occupancy before the agent's own
/// scope - a platform-wide throttle blocks every agent regardless of
/// individual headroom.
pub struct BudgetLedger {
    state: Mutex<LedgerState>,
    backoff: BackoffConfig,
    agent_window: WindowConfig,
}

impl BudgetLedger {
    /// Build scopes for the given roster. Scopes live for the fleet's
    /// lifetime; there is no dynamic scope creation.
    pub fn new(config: &BudgetConfig, roster: &[AgentSpec]) -> Self {
        let agents = roster
            .iter()
            .map(|spec| (spec.id.clone(), ScopeState::new(Some(config.per_agent))))
            .collect();
        Self {
            state: Mutex::new(LedgerState {
                global: ScopeState::new(config.global),
                agents,
            }),
            backoff: config.backoff,
            agent_window: config.per_agent,
        }
    }

    /// The single gating decision point for any outbound action.
    ///
    /// Never fails; denial is a first-class result with a caller-actionable
    /// `retry_after`.
    pub async fn try_grant(&self, agent: &AgentId, now: Instant) -> GrantDecision {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        if let Some(wait) = state.global.backoff_wait(now) {
            state.global.denied += 1;
            return GrantDecision::Denied {
                reason: DenialReason::GlobalBackoff,
                retry_after: wait,
            };
        }
        if let Some(wait) = state.global.occupancy_wait(now) {
            state.global.denied += 1;
            return GrantDecision::Denied {
                reason: DenialReason::GlobalSaturated,
                retry_after: wait,
            };
        }

        let Some(scope) = state.agents.get_mut(agent) else {
            return GrantDecision::Denied {
                reason: DenialReason::UnknownAgent,
                retry_after: self.agent_window.window,
            };
        };
        if let Some(wait) = scope.backoff_wait(now) {
            scope.denied += 1;
            return GrantDecision::Denied {
                reason: DenialReason::AgentBackoff,
                retry_after: wait,
            };
        }
        if let Some(wait) = scope.occupancy_wait(now) {
            scope.denied += 1;
            return GrantDecision::Denied {
                reason: DenialReason::AgentSaturated,
                retry_after: wait,
            };
        }

        scope.consume(now);
        state.global.consume(now);
        GrantDecision::Granted
    }

    /// Fold the outcome of an attempted action back into the ledger.
    ///
    /// Rate limits escalate backoff on both the agent scope and the global
    /// scope - throttle signals from the platform are system-wide. Successes
    /// decay escalation per the configured streak; other failures only reset
    /// the streak.
    pub async fn record(&self, agent: &AgentId, outcome: RecordOutcome, now: Instant) {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let scope = state.agents.get_mut(agent);
        match outcome {
            RecordOutcome::Success => {
                if let Some(scope) = scope {
                    scope.settle(&self.backoff);
                }
                state.global.settle(&self.backoff);
            }
            RecordOutcome::RateLimited { retry_after } => {
                let mut level = 0;
                if let Some(scope) = scope {
                    scope.escalate(now, retry_after, &self.backoff);
                    level = scope.level;
                }
                state.global.escalate(now, retry_after, &self.backoff);
                tracing::warn!(
                    agent = %agent,
                    level,
                    ?retry_after,
                    "platform rate limit recorded; backoff escalated"
                );
            }
            RecordOutcome::Failure => {
                if let Some(scope) = scope {
                    scope.clean_streak = 0;
                }
                state.global.clean_streak = 0;
            }
        }
    }

    /// Remaining backoff for an agent's scope, if any. Telemetry helper.
    pub async fn backoff_remaining(&self, agent: &AgentId, now: Instant) -> Option<Duration> {
        let mut state = self.state.lock().await;
        state.agents.get_mut(agent)?.backoff_wait(now)
    }

    /// Point-in-time ledger report.
    pub async fn status(&self, now: Instant) -> LedgerStatus {
        let state = self.state.lock().await;
        LedgerStatus {
            global: state.global.status(now),
            agents: state
                .agents
                .iter()
                .map(|(id, scope)| (id.as_str().to_string(), scope.status(now)))
                .collect(),
        }
    }
}
