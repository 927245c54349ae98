//! Prefetch priority scoring.
//!
//! ```text
//! score = 50
//!       + 30  visited within the recent-visit window
//!       + 20  one transition from the active zone
//!       - 10  already resident as Proxy
//!       - 20  already resident as Simplified
//!       + heading bonus when the predicted direction points at the zone
//! ```

use serde::Serialize;

use super::config::{
    PrefetchConfig, ADJACENT_BONUS, BASE_SCORE, PROXY_PENALTY, RECENT_VISIT_BONUS,
    SIMPLIFIED_PENALTY,
};
use crate::coord::Vec2;
use crate::lifecycle::ZoneState;
use crate::registry::ZoneId;

/// Facts about one candidate zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreInputs {
    pub state: ZoneState,
    pub adjacent: bool,
    pub visited_recently: bool,
    pub heading_aligned: bool,
}

/// Scored candidate, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrefetchScore {
    pub zone: ZoneId,
    pub score: i32,
    pub state: ZoneState,
    /// A load was requested for this zone on the tick it was scored.
    pub requested: bool,
}

/// Priority of prefetching a zone.
pub fn score_zone(inputs: &ScoreInputs, config: &PrefetchConfig) -> i32 {
    let mut score = BASE_SCORE;
    if inputs.visited_recently {
        score += RECENT_VISIT_BONUS;
    }
    if inputs.adjacent {
        score += ADJACENT_BONUS;
    }
    match inputs.state {
        ZoneState::Proxy => score -= PROXY_PENALTY,
        ZoneState::Simplified => score -= SIMPLIFIED_PENALTY,
        _ => {}
    }
    if inputs.heading_aligned {
        score += config.heading_bonus;
    }
    score
}

/// Whether `heading` from `position` points at `anchor` within the cone
/// described by `min_alignment` (a cosine).
pub fn heading_points_at(heading: Vec2, position: Vec2, anchor: Vec2, min_alignment: f32) -> bool {
    match (anchor - position).normalized(f32::EPSILON) {
        Some(toward) => heading.dot(toward) >= min_alignment,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(state: ZoneState, adjacent: bool, visited_recently: bool) -> ScoreInputs {
        ScoreInputs {
            state,
            adjacent,
            visited_recently,
            heading_aligned: false,
        }
    }

    #[test]
    fn test_score_components() {
        let config = PrefetchConfig::default();

        assert_eq!(score_zone(&inputs(ZoneState::Unloaded, false, false), &config), 50);
        assert_eq!(score_zone(&inputs(ZoneState::Unloaded, true, false), &config), 70);
        assert_eq!(score_zone(&inputs(ZoneState::Unloaded, true, true), &config), 100);
        assert_eq!(score_zone(&inputs(ZoneState::Proxy, true, false), &config), 60);
        assert_eq!(score_zone(&inputs(ZoneState::Simplified, true, false), &config), 50);
    }

    #[test]
    fn test_distant_unvisited_zone_stays_below_threshold() {
        let config = PrefetchConfig::default();
        let score = score_zone(&inputs(ZoneState::Unloaded, false, false), &config);
        assert!(score < config.score_threshold);
    }

    #[test]
    fn test_heading_bonus_defaults_to_zero() {
        let aligned = ScoreInputs {
            heading_aligned: true,
            ..inputs(ZoneState::Unloaded, false, false)
        };
        assert_eq!(score_zone(&aligned, &PrefetchConfig::default()), 50);

        let config = PrefetchConfig::default().with_heading_bonus(15);
        assert_eq!(score_zone(&aligned, &config), 65);
    }

    #[test]
    fn test_heading_points_at() {
        let east = Vec2::new(1.0, 0.0);
        assert!(heading_points_at(east, Vec2::ZERO, Vec2::new(10.0, 1.0), 0.7));
        assert!(!heading_points_at(east, Vec2::ZERO, Vec2::new(-10.0, 0.0), 0.7));
        assert!(!heading_points_at(east, Vec2::ZERO, Vec2::ZERO, 0.7));
    }
}
