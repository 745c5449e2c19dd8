// ABOUTME: Engagement-saturation registry for trends and entities.
// ABOUTME: Rolling per-target counters, pruned lazily; saturation is enforced at proposal time.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::TargetConfig;

/// Identifier for an engagement target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetId(String);

impl TargetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What kind of opportunity a target is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetCategory {
    /// A trending topic.
    Trend,
    /// A platform account worth engaging.
    Entity,
}

/// A scored engagement opportunity from the environmental scanner.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: TargetId,
    pub category: TargetCategory,
    pub score: f64,
}

impl Candidate {
    pub fn new(id: impl Into<String>, category: TargetCategory, score: f64) -> Self {
        Self {
            id: TargetId::new(id),
            category,
            score,
        }
    }
}

struct TargetState {
    stamps: VecDeque<Instant>,
    last_engaged: Option<Instant>,
}

impl TargetState {
    fn new() -> Self {
        Self {
            stamps: VecDeque::new(),
            last_engaged: None,
        }
    }

    fn prune(&mut self, now: Instant, window: std::time::Duration) {
        while let Some(front) = self.stamps.front() {
            if now.saturating_duration_since(*front) >= window {
                self.stamps.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Tracks recent engagement per target so the fleet spreads its attention.
///
/// All mutation goes through the internal mutex; counts are pruned lazily on
/// each call, so no background sweep is needed. Targets whose rolling window
/// has emptied are evicted on the next lookup and recreated lazily if they
/// reappear in a snapshot.
pub struct TargetRegistry {
    config: TargetConfig,
    targets: Mutex<HashMap<TargetId, TargetState>>,
}

impl TargetRegistry {
    pub fn new(config: TargetConfig) -> Self {
        Self {
            config,
            targets: Mutex::new(HashMap::new()),
        }
    }

    /// Pick the best candidate still below its engagement cap.
    ///
    /// Filters out saturated candidates and returns the highest-scored
    /// survivor; ties in score break toward the least-recently-engaged
    /// target. Returns `None` when every candidate is saturated, which the
    /// strategy engine treats as "fall back to a non-targeted action".
    pub async fn pick_unsaturated(
        &self,
        candidates: &[Candidate],
        now: Instant,
    ) -> Option<Candidate> {
        let mut targets = self.targets.lock().await;
        self.evict_idle(&mut targets, now);

        let mut best: Option<(&Candidate, Option<Instant>)> = None;
        for candidate in candidates {
            if candidate.score.is_nan() {
                continue;
            }
            let (count, last_engaged) = targets
                .get(&candidate.id)
                .map(|state| (state.stamps.len(), state.last_engaged))
                .unwrap_or((0, None));
            if count >= self.config.engagement_cap as usize {
                continue;
            }
            let better = match &best {
                None => true,
                Some((current, current_last)) => {
                    match candidate.score.partial_cmp(&current.score) {
                        Some(std::cmp::Ordering::Greater) => true,
                        Some(std::cmp::Ordering::Equal) => {
                            less_recent(last_engaged, *current_last)
                        }
                        _ => false,
                    }
                }
            };
            if better {
                best = Some((candidate, last_engaged));
            }
        }
        best.map(|(candidate, _)| candidate.clone())
    }

    /// Record one engagement against a target.
    pub async fn record_engagement(&self, target: &Candidate, now: Instant) {
        let mut targets = self.targets.lock().await;
        let state = targets
            .entry(target.id.clone())
            .or_insert_with(TargetState::new);
        state.prune(now, self.config.window);
        state.stamps.push_back(now);
        state.last_engaged = Some(now);
    }

    /// Engagement count currently inside the rolling window.
    pub async fn engagement_count(&self, id: &TargetId, now: Instant) -> usize {
        let mut targets = self.targets.lock().await;
        match targets.get_mut(id) {
            Some(state) => {
                state.prune(now, self.config.window);
                state.stamps.len()
            }
            None => 0,
        }
    }

    /// Number of targets currently tracked, after lazy eviction.
    pub async fn tracked(&self, now: Instant) -> usize {
        let mut targets = self.targets.lock().await;
        self.evict_idle(&mut targets, now);
        targets.len()
    }

    fn evict_idle(&self, targets: &mut HashMap<TargetId, TargetState>, now: Instant) {
        targets.retain(|_, state| {
            state.prune(now, self.config.window);
            !state.stamps.is_empty()
        });
    }
}

/// True when `a` was engaged less recently than `b`. Never-engaged counts
/// as least recent.
fn less_recent(a: Option<Instant>, b: Option<Instant>) -> bool {
    match (a, b) {
        (None, None) => false,
        (None, Some(_)) => true,
        (Some(_), None) => false,
        (Some(a), Some(b)) => a < b,
    }
}
