// ABOUTME: The per-agent control loop: jittered wait, propose, grant, execute, record.
// ABOUTME: Denials retry the same proposal; repeated transport failures suspend the agent.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::watch;
use tokio::time::timeout;

use crate::budget::{BudgetLedger, GrantDecision, RecordOutcome};
use crate::config::RunnerConfig;
use crate::platform::{
    ActionOutcome, ContentGenerator, IntelligenceFeed, PlatformClient, PreparedAction,
};
use crate::registry::TargetRegistry;
use crate::strategy::{ActionProposal, CampaignPhase, StrategyEngine};

use super::handle::{AgentHandle, AgentState};

/// Exponent applied to the failure cooldown per consecutive failure.
const COOLDOWN_GROWTH: f64 = 2.0;

/// One agent's long-lived control loop.
///
/// Runners execute independently and concurrently; they contend only at the
/// ledger and target registry boundaries. The only suspension points are the
/// jitter sleep, denial/cooldown sleeps, and the timeout-bounded external
/// calls, so a cooperative shutdown never interrupts an in-flight action.
pub struct AgentRunner {
    handle: Arc<AgentHandle>,
    config: RunnerConfig,
    ledger: Arc<BudgetLedger>,
    registry: Arc<TargetRegistry>,
    strategy: Arc<StrategyEngine>,
    platform: Arc<dyn PlatformClient>,
    content: Arc<dyn ContentGenerator>,
    intel: Arc<dyn IntelligenceFeed>,
    shutdown: watch::Receiver<bool>,
    campaign_start: Instant,
}

impl AgentRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        handle: Arc<AgentHandle>,
        config: RunnerConfig,
        ledger: Arc<BudgetLedger>,
        registry: Arc<TargetRegistry>,
        strategy: Arc<StrategyEngine>,
        platform: Arc<dyn PlatformClient>,
        content: Arc<dyn ContentGenerator>,
        intel: Arc<dyn IntelligenceFeed>,
        shutdown: watch::Receiver<bool>,
        campaign_start: Instant,
    ) -> Self {
        Self {
            handle,
            config,
            ledger,
            registry,
            strategy,
            platform,
            content,
            intel,
            shutdown,
            campaign_start,
        }
    }

    /// Drive cycles until shutdown. Consumes the runner; the handle remains
    /// with the coordinator for observation.
    pub async fn run(mut self) {
        tracing::info!(
            agent = %self.handle.id(),
            persona = %self.handle.persona().tag,
            "agent runner started"
        );
        loop {
            if *self.shutdown.borrow() {
                break;
            }
            if self.handle.state() == AgentState::Suspended {
                if !self.wait_for_resume().await {
                    break;
                }
                continue;
            }
            let wait = self.jitter_interval();
            if !self.sleep_unless_shutdown(wait).await {
                break;
            }
            self.cycle().await;
        }
        self.handle.set_state(AgentState::Retired);
        tracing::info!(agent = %self.handle.id(), "agent runner retired");
    }

    /// One full decision cycle: proposal, grant, execution, bookkeeping.
    async fn cycle(&mut self) {
        let snapshot = self.intel.latest();
        let phase = if self.campaign_start.elapsed() >= self.config.audience_phase {
            CampaignPhase::Influence
        } else {
            CampaignPhase::AudienceBuilding
        };
        let proposal = self
            .strategy
            .propose(self.handle.persona(), &snapshot, phase, Instant::now())
            .await;
        tracing::debug!(
            agent = %self.handle.id(),
            kind = %proposal.kind,
            target_id = proposal.target.as_ref().map(|t| t.id.as_str()),
            priority = proposal.priority,
            "proposal ready"
        );

        let mut denials = 0u32;
        loop {
            match self.ledger.try_grant(self.handle.id(), Instant::now()).await {
                GrantDecision::Granted => {
                    self.execute(&proposal).await;
                    return;
                }
                GrantDecision::Denied {
                    reason,
                    retry_after,
                } => {
                    self.handle.record_denial();
                    denials += 1;
                    if denials > self.config.denial_retry_ceiling {
                        // Denial is expected pressure, not an error; the
                        // proposal is stale enough to abandon.
                        self.handle.record_dropped();
                        tracing::debug!(
                            agent = %self.handle.id(),
                            %reason,
                            "proposal dropped after retry ceiling"
                        );
                        self.handle.set_state(AgentState::Idle);
                        return;
                    }
                    self.handle.set_state(AgentState::Backoff);
                    let wait = retry_after.min(self.config.max_denial_backoff);
                    tracing::debug!(
                        agent = %self.handle.id(),
                        %reason,
                        wait_ms = wait.as_millis() as u64,
                        "grant denied; retrying same proposal"
                    );
                    if !self.sleep_unless_shutdown(wait).await {
                        self.handle.set_state(AgentState::Idle);
                        return;
                    }
                }
            }
        }
    }

    /// Execute a granted proposal and fold the outcome back into the ledger,
    /// registry, and handle.
    async fn execute(&mut self, proposal: &ActionProposal) {
        self.handle.set_state(AgentState::Acting);

        let body = if proposal.kind.needs_content() {
            match timeout(
                self.config.content_timeout,
                self.content.generate(&proposal.content),
            )
            .await
            {
                Ok(text) => Some(text),
                Err(_) => {
                    // A stalled generator must not hang the runner; treat as transport.
                    tracing::warn!(agent = %self.handle.id(), "content generation timed out");
                    self.ledger
                        .record(self.handle.id(), RecordOutcome::Failure, Instant::now())
                        .await;
                    self.after_failure().await;
                    return;
                }
            }
        } else {
            None
        };

        let action = PreparedAction {
            kind: proposal.kind,
            target: proposal.target.as_ref().map(|t| t.id.clone()),
            body,
        };
        let outcome = match timeout(self.config.action_timeout, self.platform.execute(&action))
            .await
        {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                tracing::warn!(agent = %self.handle.id(), error = %err, "platform client error");
                ActionOutcome::TransportError
            }
            Err(_) => {
                tracing::warn!(agent = %self.handle.id(), "platform action timed out");
                ActionOutcome::TransportError
            }
        };

        let now = Instant::now();
        self.ledger
            .record(self.handle.id(), RecordOutcome::from(&outcome), now)
            .await;

        match outcome {
            ActionOutcome::Success => {
                self.handle.record_success(now);
                if let Some(target) = &proposal.target {
                    self.registry.record_engagement(target, now).await;
                }
                tracing::debug!(agent = %self.handle.id(), kind = %proposal.kind, "action executed");
                self.handle.set_state(AgentState::Idle);
            }
            ActionOutcome::RateLimited { retry_after } => {
                // The ledger backoff gates the next cycle; nothing to do here.
                self.handle.record_rate_limited();
                tracing::warn!(agent = %self.handle.id(), ?retry_after, "platform rate limited");
                self.handle.set_state(AgentState::Idle);
            }
            ActionOutcome::AuthFailure | ActionOutcome::TransportError => {
                tracing::warn!(agent = %self.handle.id(), %outcome, "action failed");
                self.after_failure().await;
            }
        }
    }

    /// Cooldown after a transport/auth failure; suspend past the ceiling.
    async fn after_failure(&mut self) {
        let failures = self.handle.record_failure();
        if failures >= self.config.failure_ceiling {
            self.handle.suspend(Instant::now());
            tracing::warn!(
                agent = %self.handle.id(),
                failures,
                "agent suspended after consecutive failures"
            );
            return;
        }
        self.handle.set_state(AgentState::Backoff);
        let cooldown = failure_cooldown(
            failures,
            self.config.cooldown_base,
            self.config.cooldown_max,
        );
        tracing::debug!(
            agent = %self.handle.id(),
            failures,
            cooldown_ms = cooldown.as_millis() as u64,
            "cooling down after failure"
        );
        self.sleep_unless_shutdown(cooldown).await;
        self.handle.set_state(AgentState::Idle);
    }

    /// Uniform draw from the configured cycle interval. The jitter is
    /// mandatory: fixed intervals are a detectable coordination signature.
    fn jitter_interval(&self) -> Duration {
        let min = self.config.cycle_min.as_millis() as u64;
        let max = self.config.cycle_max.as_millis() as u64;
        if min >= max {
            return self.config.cycle_min;
        }
        Duration::from_millis(rand::rng().random_range(min..=max))
    }

    /// Sleep that ends early on shutdown. Returns false when shutting down.
    async fn sleep_unless_shutdown(&mut self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.shutdown.wait_for(|stop| *stop) => false,
            () = tokio::time::sleep(duration) => true,
        }
    }

    /// Park until the coordinator (or an operator) resumes this agent.
    /// Returns false when shutdown arrives first.
    async fn wait_for_resume(&mut self) -> bool {
        tokio::select! {
            biased;
            _ = self.shutdown.wait_for(|stop| *stop) => false,
            () = self.handle.resumed() => true,
        }
    }
}

fn failure_cooldown(failures: u32, base: Duration, max: Duration) -> Duration {
    let exponent = failures.saturating_sub(1).min(63) as i32;
    let raw = base.as_secs_f64() * COOLDOWN_GROWTH.powi(exponent);
    Duration::from_secs_f64(raw.min(max.as_secs_f64()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_cooldown_doubles_then_caps() {
        let base = Duration::from_secs(60);
        let max = Duration::from_secs(900);
        assert_eq!(failure_cooldown(1, base, max), Duration::from_secs(60));
        assert_eq!(failure_cooldown(2, base, max), Duration::from_secs(120));
        assert_eq!(failure_cooldown(4, base, max), Duration::from_secs(480));
        assert_eq!(failure_cooldown(5, base, max), Duration::from_secs(900));
        assert_eq!(failure_cooldown(30, base, max), Duration::from_secs(900));
    }
}
