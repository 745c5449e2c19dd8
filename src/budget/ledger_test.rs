// ABOUTME: Tests for the budget ledger.
// ABOUTME: Covers window caps, global-before-agent ordering, adaptive backoff, and decay.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::ledger::{BudgetLedger, DenialReason, GrantDecision, RecordOutcome};
use crate::config::{AgentId, AgentSpec, BackoffConfig, BudgetConfig, Persona, PersonaTone, WindowConfig};

fn roster(ids: &[&str]) -> Vec<AgentSpec> {
    ids.iter()
        .map(|id| {
            AgentSpec::with_id(AgentId::new(*id), Persona::new("tester", PersonaTone::Casual))
        })
        .collect()
}

fn budget(global: Option<(u32, u64)>, per_agent: (u32, u64)) -> BudgetConfig {
    BudgetConfig {
        global: global.map(|(limit, secs)| WindowConfig::new(limit, Duration::from_secs(secs))),
        per_agent: WindowConfig::new(per_agent.0, Duration::from_secs(per_agent.1)),
        backoff: BackoffConfig::default(),
    }
}

fn denial(decision: GrantDecision) -> (DenialReason, Duration) {
    match decision {
        GrantDecision::Denied {
            reason,
            retry_after,
        } => (reason, retry_after),
        GrantDecision::Granted => panic!("expected a denial"),
    }
}

#[tokio::test]
async fn test_one_per_minute_denies_second_request_with_remaining_wait() {
    let ledger = BudgetLedger::new(&budget(None, (1, 60)), &roster(&["a"]));
    let agent = AgentId::new("a");
    let t0 = Instant::now();

    assert!(ledger.try_grant(&agent, t0).await.is_granted());

    let (reason, retry_after) = denial(ledger.try_grant(&agent, t0 + Duration::from_secs(10)).await);
    assert_eq!(reason, DenialReason::AgentSaturated);
    assert_eq!(retry_after, Duration::from_secs(50));

    // The slot frees exactly one window after the first grant.
    assert!(
        ledger
            .try_grant(&agent, t0 + Duration::from_secs(60))
            .await
            .is_granted()
    );
}

#[tokio::test]
async fn test_window_never_exceeds_limit_under_concurrency() {
    let ledger = Arc::new(BudgetLedger::new(&budget(None, (5, 60)), &roster(&["a"])));
    let agent = AgentId::new("a");
    let now = Instant::now();

    let mut handles = Vec::new();
    for _ in 0..20 {
        let ledger = ledger.clone();
        let agent = agent.clone();
        handles.push(tokio::spawn(
            async move { ledger.try_grant(&agent, now).await },
        ));
    }

    let mut granted = 0;
    for handle in handles {
        if handle.await.unwrap().is_granted() {
            granted += 1;
        }
    }
    assert_eq!(granted, 5, "exactly the window limit may be granted");
}

#[tokio::test]
async fn test_global_window_blocks_agent_with_headroom() {
    let ledger = BudgetLedger::new(&budget(Some((1, 60)), (5, 60)), &roster(&["a", "b"]));
    let now = Instant::now();

    assert!(ledger.try_grant(&AgentId::new("a"), now).await.is_granted());

    let (reason, retry_after) = denial(ledger.try_grant(&AgentId::new("b"), now).await);
    assert_eq!(reason, DenialReason::GlobalSaturated);
    assert_eq!(retry_after, Duration::from_secs(60));
}

#[tokio::test]
async fn test_unknown_agent_is_denied_not_panicked() {
    let ledger = BudgetLedger::new(&budget(None, (3, 60)), &roster(&["a"]));
    let (reason, _) = denial(ledger.try_grant(&AgentId::new("ghost"), Instant::now()).await);
    assert_eq!(reason, DenialReason::UnknownAgent);
}

#[tokio::test]
async fn test_consecutive_rate_limits_escalate_backoff_to_cap() {
    // Base 30s, x2, capped at 300s.
    let ledger = BudgetLedger::new(&budget(None, (10, 60)), &roster(&["a"]));
    let agent = AgentId::new("a");
    let t0 = Instant::now();

    for expected_secs in [30u64, 60, 120, 240, 300, 300] {
        ledger
            .record(&agent, RecordOutcome::RateLimited { retry_after: None }, t0)
            .await;
        let (_, retry_after) = denial(ledger.try_grant(&agent, t0).await);
        assert_eq!(retry_after, Duration::from_secs(expected_secs));
    }
}

#[tokio::test]
async fn test_backoff_denies_until_elapsed_then_grants() {
    let ledger = BudgetLedger::new(&budget(None, (10, 60)), &roster(&["a"]));
    let agent = AgentId::new("a");
    let t0 = Instant::now();

    ledger
        .record(&agent, RecordOutcome::RateLimited { retry_after: None }, t0)
        .await;

    let (reason, retry_after) = denial(ledger.try_grant(&agent, t0 + Duration::from_secs(29)).await);
    assert_eq!(reason, DenialReason::GlobalBackoff);
    assert_eq!(retry_after, Duration::from_secs(1));

    assert!(
        ledger
            .try_grant(&agent, t0 + Duration::from_secs(30))
            .await
            .is_granted()
    );
}

#[tokio::test]
async fn test_server_retry_hint_extends_backoff() {
    let ledger = BudgetLedger::new(&budget(None, (10, 60)), &roster(&["a"]));
    let agent = AgentId::new("a");
    let t0 = Instant::now();

    ledger
        .record(
            &agent,
            RecordOutcome::RateLimited {
                retry_after: Some(Duration::from_secs(600)),
            },
            t0,
        )
        .await;

    let (_, retry_after) = denial(ledger.try_grant(&agent, t0).await);
    assert_eq!(retry_after, Duration::from_secs(600));
}

#[tokio::test]
async fn test_sustained_success_decays_escalation_level() {
    let mut config = budget(None, (10, 60));
    config.backoff.decay_streak = 2;
    let ledger = BudgetLedger::new(&config, &roster(&["a"]));
    let agent = AgentId::new("a");
    let t0 = Instant::now();

    for _ in 0..3 {
        ledger
            .record(&agent, RecordOutcome::RateLimited { retry_after: None }, t0)
            .await;
    }
    assert_eq!(ledger.status(t0).await.global.backoff_level, 3);

    // Two clean successes step the level down one notch.
    ledger.record(&agent, RecordOutcome::Success, t0).await;
    ledger.record(&agent, RecordOutcome::Success, t0).await;
    assert_eq!(ledger.status(t0).await.global.backoff_level, 2);
}

#[tokio::test]
async fn test_failure_resets_the_clean_streak() {
    let mut config = budget(None, (10, 60));
    config.backoff.decay_streak = 2;
    let ledger = BudgetLedger::new(&config, &roster(&["a"]));
    let agent = AgentId::new("a");
    let t0 = Instant::now();

    ledger
        .record(&agent, RecordOutcome::RateLimited { retry_after: None }, t0)
        .await;
    ledger.record(&agent, RecordOutcome::Success, t0).await;
    ledger.record(&agent, RecordOutcome::Failure, t0).await;
    ledger.record(&agent, RecordOutcome::Success, t0).await;

    // The failure broke the streak, so the level has not decayed.
    assert_eq!(ledger.status(t0).await.global.backoff_level, 1);
}

#[tokio::test]
async fn test_status_reports_occupancy_and_counters() {
    let ledger = BudgetLedger::new(&budget(Some((8, 60)), (2, 60)), &roster(&["a", "b"]));
    let agent = AgentId::new("a");
    let t0 = Instant::now();

    assert!(ledger.try_grant(&agent, t0).await.is_granted());
    assert!(ledger.try_grant(&agent, t0).await.is_granted());
    denial(ledger.try_grant(&agent, t0).await);

    let status = ledger.status(t0).await;
    assert_eq!(status.global.in_window, 2);
    assert_eq!(status.global.limit, Some(8));

    let scope = &status.agents["a"];
    assert_eq!(scope.in_window, 2);
    assert_eq!(scope.granted, 2);
    assert_eq!(scope.denied, 1);
    assert_eq!(status.agents["b"].in_window, 0);
}
