//! Predictive zone prefetching.
//!
//! Each tick the prefetcher scores the zones around the active zone and asks
//! the lifecycle controller to bring the most likely next zones in at
//! `Simplified` detail, so a later hand-off only has to upgrade them.
//!
//! # Design
//!
//! ```text
//!  tick(position)
//!      │
//!      ├─ record movement ──► MovementHistory (heading)
//!      │
//!      ├─ suspended? (transition active / reduced performance) ──► stop
//!      │
//!      ├─ candidates = connected_zones(active, scan_depth) − active
//!      ├─ score each (see [`scorer`])
//!      └─ top N with score ≥ threshold and Unloaded,
//!         each gated by can_afford(size × afford_fraction)
//!             └──► lifecycle.request_load(zone, Simplified)
//! ```
//!
//! The prefetcher never unloads anything; eviction is the budget's job.

mod config;
mod history;
mod performance;
pub mod scorer;

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::coord::Vec2;
use crate::lifecycle::{DetailLevel, LoadTicket, ZoneLifecycle, ZoneState};

pub use config::{
    PrefetchConfig, ADJACENT_BONUS, BASE_SCORE, DEFAULT_AFFORD_FRACTION, DEFAULT_HEADING_BONUS,
    DEFAULT_HEADING_MIN_ALIGNMENT, DEFAULT_HISTORY_CAPACITY, DEFAULT_MAX_REQUESTS_PER_TICK,
    DEFAULT_RECENT_VISIT_WINDOW, DEFAULT_SCAN_DEPTH, DEFAULT_SCORE_THRESHOLD, PROXY_PENALTY,
    RECENT_VISIT_BONUS, SIMPLIFIED_PENALTY,
};
pub use history::MovementHistory;
pub use performance::{PerformanceClass, PerformanceSignal, ReducedPerformance, SteadyPerformance};
pub use scorer::{PrefetchScore, ScoreInputs};

/// What the prefetcher did on its last tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrefetchStatus {
    /// No active zone yet.
    #[default]
    Idle,
    /// Scored candidates this tick.
    Active,
    /// Skipped while a hand-off is in progress.
    SuspendedTransition,
    /// Skipped because the host reported reduced performance.
    SuspendedPerformance,
}

impl PrefetchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrefetchStatus::Idle => "idle",
            PrefetchStatus::Active => "active",
            PrefetchStatus::SuspendedTransition => "suspended (transition)",
            PrefetchStatus::SuspendedPerformance => "suspended (performance)",
        }
    }

    pub fn is_suspended(&self) -> bool {
        matches!(
            self,
            PrefetchStatus::SuspendedTransition | PrefetchStatus::SuspendedPerformance
        )
    }
}

impl fmt::Display for PrefetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scores neighbouring zones and requests speculative loads.
#[derive(Debug)]
pub struct ZonePrefetcher {
    config: PrefetchConfig,
    history: MovementHistory,
    status: PrefetchStatus,
    last_scores: Vec<PrefetchScore>,
    requests_issued: u64,
}

impl Default for ZonePrefetcher {
    fn default() -> Self {
        Self::new(PrefetchConfig::default())
    }
}

impl ZonePrefetcher {
    pub fn new(config: PrefetchConfig) -> Self {
        Self {
            history: MovementHistory::with_capacity(config.history_capacity),
            config,
            status: PrefetchStatus::Idle,
            last_scores: Vec::new(),
            requests_issued: 0,
        }
    }

    pub fn config(&self) -> &PrefetchConfig {
        &self.config
    }

    pub fn history(&self) -> &MovementHistory {
        &self.history
    }

    /// Forget recorded movement, e.g. after a hand-off repositions the player.
    pub fn reset_history(&mut self) {
        self.history.reset();
    }

    pub fn status(&self) -> PrefetchStatus {
        self.status
    }

    /// Candidates scored on the last active tick, highest first.
    pub fn last_scores(&self) -> &[PrefetchScore] {
        &self.last_scores
    }

    /// Total prefetch loads requested.
    pub fn requests_issued(&self) -> u64 {
        self.requests_issued
    }

    /// Run one prefetch cycle. Returns tickets for the loads it requested.
    pub fn tick(
        &mut self,
        lifecycle: &ZoneLifecycle,
        position: Vec2,
        performance: PerformanceClass,
        transition_active: bool,
    ) -> Vec<LoadTicket> {
        self.history.record(position);

        if transition_active {
            self.set_status(PrefetchStatus::SuspendedTransition);
            return Vec::new();
        }
        if performance.is_reduced() {
            self.set_status(PrefetchStatus::SuspendedPerformance);
            return Vec::new();
        }
        let Some(active) = lifecycle.active() else {
            self.set_status(PrefetchStatus::Idle);
            return Vec::new();
        };
        self.set_status(PrefetchStatus::Active);

        let registry = lifecycle.registry();
        let adjacent = registry.adjacent_zones(&active);
        let heading = self.history.predicted_direction();
        let now = lifecycle.now();

        let mut scores: Vec<PrefetchScore> = registry
            .connected_zones(&active, self.config.scan_depth)
            .into_iter()
            .filter(|zone| *zone != active)
            .filter_map(|zone| {
                let status = lifecycle.status(&zone)?;
                let visited_recently = status
                    .last_visited_at
                    .is_some_and(|at| now.saturating_sub(at) <= self.config.recent_visit_window);
                let heading_aligned = match (heading, registry.zone(&zone).and_then(|z| z.anchor)) {
                    (Some(heading), Some(anchor)) => scorer::heading_points_at(
                        heading,
                        position,
                        anchor,
                        self.config.heading_min_alignment,
                    ),
                    _ => false,
                };
                let inputs = ScoreInputs {
                    state: status.state,
                    adjacent: adjacent.contains(&zone),
                    visited_recently,
                    heading_aligned,
                };
                Some(PrefetchScore {
                    score: scorer::score_zone(&inputs, &self.config),
                    state: status.state,
                    zone,
                    requested: false,
                })
            })
            .collect();
        scores.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.zone.cmp(&b.zone)));

        let mut tickets = Vec::new();
        let eligible = scores
            .iter_mut()
            .filter(|s| s.score >= self.config.score_threshold && s.state == ZoneState::Unloaded)
            .take(self.config.max_requests_per_tick);

        for entry in eligible {
            let size = registry
                .zone(&entry.zone)
                .map(|z| z.size_bytes())
                .unwrap_or(0);
            let needed = (size as f64 * self.config.afford_fraction) as u64;
            if !lifecycle.can_afford(needed) {
                debug!(zone = %entry.zone, needed, "Prefetch skipped, budget too tight");
                continue;
            }

            match lifecycle.request_speculative(&entry.zone, DetailLevel::Simplified) {
                Ok(ticket) => {
                    debug!(zone = %entry.zone, score = entry.score, "Prefetch requested");
                    entry.requested = true;
                    tickets.push(ticket);
                }
                Err(e) => debug!(zone = %entry.zone, error = %e, "Prefetch request refused"),
            }
        }

        self.requests_issued += tickets.len() as u64;
        self.last_scores = scores;
        tickets
    }

    fn set_status(&mut self, status: PrefetchStatus) {
        if self.status != status {
            debug!(from = %self.status, to = %status, "Prefetch status changed");
            self.status = status;
        }
    }
}
