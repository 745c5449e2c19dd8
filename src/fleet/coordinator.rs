// ABOUTME: The fleet coordinator - spawns one runner task per agent and watches their health.
// ABOUTME: Cooperative stop lets in-flight actions finish; recovery policy decides on suspended agents.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::agent::{AgentHandle, AgentRunner, AgentState, AgentStatus};
use crate::budget::{BudgetLedger, LedgerStatus};
use crate::config::{AgentId, FleetConfig, RecoveryPolicy};
use crate::error::{CadreError, FleetError};
use crate::platform::{ContentGenerator, IntelligenceFeed, PlatformClient};
use crate::registry::TargetRegistry;
use crate::strategy::StrategyEngine;

/// Aggregated fleet view for an external monitoring surface.
#[derive(Debug, Clone, Serialize)]
pub struct FleetStatus {
    pub running: bool,
    pub agents: Vec<AgentStatus>,
    pub budget: LedgerStatus,
    pub total_actions: u64,
    pub total_denials: u64,
    /// Fleet-wide exhaustion: every agent is suspended. The only condition
    /// surfaced to an operator layer.
    pub all_suspended: bool,
}

/// Owns the set of agent runners: starts them, isolates failures, applies
/// the recovery policy, and aggregates fleet-wide statistics.
///
/// Runners execute independently with no shared call stack; the coordinator
/// only observes their handles. No single agent's failure aborts the fleet.
pub struct FleetCoordinator {
    config: FleetConfig,
    ledger: Arc<BudgetLedger>,
    registry: Arc<TargetRegistry>,
    strategy: Arc<StrategyEngine>,
    platform: Arc<dyn PlatformClient>,
    content: Arc<dyn ContentGenerator>,
    intel: Arc<dyn IntelligenceFeed>,
    handles: Vec<Arc<AgentHandle>>,
    tasks: Vec<JoinHandle<()>>,
    monitor: Option<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
    running: bool,
}

impl FleetCoordinator {
    /// Validate the configuration and build the shared infrastructure.
    ///
    /// Validation failure aborts here - a fleet never starts with malformed
    /// weights or non-positive limits.
    pub fn new(
        config: FleetConfig,
        platform: Arc<dyn PlatformClient>,
        content: Arc<dyn ContentGenerator>,
        intel: Arc<dyn IntelligenceFeed>,
    ) -> Result<Self, CadreError> {
        config.validate()?;

        let ledger = Arc::new(BudgetLedger::new(&config.budget, &config.agents));
        let registry = Arc::new(TargetRegistry::new(config.targets));
        let strategy = Arc::new(StrategyEngine::new(
            config.objective,
            registry.clone(),
            config.strategy,
        ));
        let handles = config
            .agents
            .iter()
            .map(|spec| Arc::new(AgentHandle::new(spec.id.clone(), spec.persona.clone())))
            .collect();
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            config,
            ledger,
            registry,
            strategy,
            platform,
            content,
            intel,
            handles,
            tasks: Vec::new(),
            monitor: None,
            shutdown,
            running: false,
        })
    }

    /// Spawn one runner task per configured agent plus the health monitor.
    pub fn start(&mut self) -> Result<(), CadreError> {
        if self.running {
            return Err(FleetError::AlreadyStarted.into());
        }

        let (shutdown, _) = watch::channel(false);
        self.shutdown = shutdown;
        let campaign_start = Instant::now();

        for handle in &self.handles {
            handle.set_state(AgentState::Idle);
            let runner = AgentRunner::new(
                handle.clone(),
                self.config.runner.clone(),
                self.ledger.clone(),
                self.registry.clone(),
                self.strategy.clone(),
                self.platform.clone(),
                self.content.clone(),
                self.intel.clone(),
                self.shutdown.subscribe(),
                campaign_start,
            );
            self.tasks.push(tokio::spawn(runner.run()));
        }
        self.monitor = Some(tokio::spawn(monitor_loop(
            self.handles.clone(),
            self.config.recovery,
            self.config.monitor_interval,
            self.shutdown.subscribe(),
        )));
        self.running = true;
        tracing::info!(agents = self.handles.len(), "fleet started");
        Ok(())
    }

    /// Cooperative stop: signal every runner to finish its current cycle and
    /// not begin a new one, then wait for all of them. Returns only once
    /// each runner has reached its terminal state - no runner is killed
    /// mid-action.
    pub async fn stop(&mut self) -> Result<(), CadreError> {
        if !self.running {
            return Err(FleetError::NotStarted.into());
        }
        tracing::info!("stopping fleet");
        let _ = self.shutdown.send(true);

        if let Some(monitor) = self.monitor.take() {
            let _ = monitor.await;
        }
        join_all(self.tasks.drain(..)).await;
        self.running = false;
        tracing::info!("fleet stopped");
        Ok(())
    }

    /// Point-in-time fleet report: per-agent state, cumulative actions,
    /// denial counts, and current backoff levels.
    pub async fn snapshot(&self) -> FleetStatus {
        let agents: Vec<AgentStatus> = self.handles.iter().map(|handle| handle.status()).collect();
        let all_suspended = !agents.is_empty()
            && agents
                .iter()
                .all(|agent| agent.state == AgentState::Suspended);
        FleetStatus {
            running: self.running,
            total_actions: agents.iter().map(|a| a.actions_executed).sum(),
            total_denials: agents.iter().map(|a| a.denials).sum(),
            budget: self.ledger.status(Instant::now()).await,
            all_suspended,
            agents,
        }
    }

    /// Look up one agent's handle, e.g. for a manual resume.
    pub fn agent(&self, id: &AgentId) -> Option<&Arc<AgentHandle>> {
        self.handles.iter().find(|handle| handle.id() == id)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

/// Watches runner health and applies the recovery policy. Raises one
/// error-level report when the whole fleet is suspended.
async fn monitor_loop(
    handles: Vec<Arc<AgentHandle>>,
    policy: RecoveryPolicy,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut exhaustion_reported = false;
    loop {
        tokio::select! {
            biased;
            _ = shutdown.wait_for(|stop| *stop) => break,
            () = tokio::time::sleep(interval) => {}
        }

        let now = Instant::now();
        let mut suspended = 0usize;
        for handle in &handles {
            if handle.state() != AgentState::Suspended {
                continue;
            }
            suspended += 1;
            if let RecoveryPolicy::AutoResume { cooldown } = policy {
                let cooled = handle
                    .suspended_since()
                    .is_some_and(|since| now.saturating_duration_since(since) >= cooldown);
                if cooled && handle.resume() {
                    suspended -= 1;
                    tracing::info!(agent = %handle.id(), "suspended agent re-activated");
                }
            }
        }

        if suspended == handles.len() && !handles.is_empty() {
            if !exhaustion_reported {
                tracing::error!("all agents suspended; fleet needs intervention");
                exhaustion_reported = true;
            }
        } else {
            exhaustion_reported = false;
        }
    }
}
