//! Prefetch configuration.

use std::time::Duration;

// ==================== Scoring ====================

/// Score every candidate starts from.
pub const BASE_SCORE: i32 = 50;

/// Bonus for a zone that was active within the recent-visit window.
pub const RECENT_VISIT_BONUS: i32 = 30;

/// Bonus for a zone one transition away from the active zone.
pub const ADJACENT_BONUS: i32 = 20;

/// Penalty for a zone already resident as a proxy.
pub const PROXY_PENALTY: i32 = 10;

/// Penalty for a zone already resident as a simplified model.
pub const SIMPLIFIED_PENALTY: i32 = 20;

// ==================== Defaults ====================

/// Default number of movement samples kept.
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// Default window in which a visit counts as recent.
pub const DEFAULT_RECENT_VISIT_WINDOW: Duration = Duration::from_secs(60);

/// Default minimum score for a prefetch request.
pub const DEFAULT_SCORE_THRESHOLD: i32 = 60;

/// Default maximum prefetch requests issued per tick.
pub const DEFAULT_MAX_REQUESTS_PER_TICK: usize = 2;

/// Default graph depth scanned around the active zone. Only direct
/// neighbours are scored unless widened.
pub const DEFAULT_SCAN_DEPTH: usize = 1;

/// Default bonus when the predicted heading points at a zone. Disabled.
pub const DEFAULT_HEADING_BONUS: i32 = 0;

/// Default minimum cosine between heading and zone direction for the bonus.
pub const DEFAULT_HEADING_MIN_ALIGNMENT: f32 = 0.7;

/// Fraction of a zone's size that must fit before it is prefetched.
pub const DEFAULT_AFFORD_FRACTION: f64 = 0.5;

/// Tuning for [`ZonePrefetcher`](super::ZonePrefetcher).
#[derive(Debug, Clone, PartialEq)]
pub struct PrefetchConfig {
    /// Movement samples kept for heading prediction.
    pub history_capacity: usize,
    /// A visit this recent earns [`RECENT_VISIT_BONUS`].
    pub recent_visit_window: Duration,
    /// Minimum score for a request.
    pub score_threshold: i32,
    /// Requests issued per tick, highest score first.
    pub max_requests_per_tick: usize,
    /// Graph depth scanned around the active zone.
    pub scan_depth: usize,
    /// Bonus when the predicted heading points at a zone's anchor.
    pub heading_bonus: i32,
    /// Minimum cosine for the heading bonus.
    pub heading_min_alignment: f32,
    /// Fraction of a zone's size that must fit under the budget.
    pub afford_fraction: f64,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            recent_visit_window: DEFAULT_RECENT_VISIT_WINDOW,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            max_requests_per_tick: DEFAULT_MAX_REQUESTS_PER_TICK,
            scan_depth: DEFAULT_SCAN_DEPTH,
            heading_bonus: DEFAULT_HEADING_BONUS,
            heading_min_alignment: DEFAULT_HEADING_MIN_ALIGNMENT,
            afford_fraction: DEFAULT_AFFORD_FRACTION,
        }
    }
}

impl PrefetchConfig {
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn with_recent_visit_window(mut self, window: Duration) -> Self {
        self.recent_visit_window = window;
        self
    }

    pub fn with_score_threshold(mut self, threshold: i32) -> Self {
        self.score_threshold = threshold;
        self
    }

    pub fn with_max_requests_per_tick(mut self, max: usize) -> Self {
        self.max_requests_per_tick = max;
        self
    }

    pub fn with_scan_depth(mut self, depth: usize) -> Self {
        self.scan_depth = depth;
        self
    }

    pub fn with_heading_bonus(mut self, bonus: i32) -> Self {
        self.heading_bonus = bonus;
        self
    }
}
