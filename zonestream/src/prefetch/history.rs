//! Player movement history and heading prediction.
//!
//! # Design
//!
//! - Stores the last N position deltas (default 10), oldest first
//! - Predicts heading as the recency-weighted mean of the deltas: the i-th
//!   oldest sample has weight i, so recent movement dominates
//! - Returns no heading until the player has actually moved

use std::collections::VecDeque;

use crate::coord::Vec2;

use super::config::DEFAULT_HISTORY_CAPACITY;

/// Minimum weighted movement length for a reliable heading.
const MIN_HEADING_LENGTH: f32 = 1e-4;

/// Bounded history of player movement.
///
/// ```
/// use zonestream::coord::Vec2;
/// use zonestream::prefetch::MovementHistory;
///
/// let mut history = MovementHistory::new();
/// history.record(Vec2::new(0.0, 0.0));
/// history.record(Vec2::new(1.0, 0.0));
/// assert_eq!(history.predicted_direction(), Some(Vec2::new(1.0, 0.0)));
/// ```
#[derive(Debug, Clone)]
pub struct MovementHistory {
    deltas: VecDeque<Vec2>,
    capacity: usize,
    last_position: Option<Vec2>,
}

impl Default for MovementHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl MovementHistory {
    /// History with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// History keeping at most `capacity` deltas.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            deltas: VecDeque::with_capacity(capacity),
            capacity,
            last_position: None,
        }
    }

    /// Record the player's position this frame.
    ///
    /// The first call only establishes the starting point.
    pub fn record(&mut self, position: Vec2) {
        if let Some(last) = self.last_position {
            if self.deltas.len() == self.capacity {
                self.deltas.pop_front();
            }
            self.deltas.push_back(position - last);
        }
        self.last_position = Some(position);
    }

    /// Forget all movement, e.g. after the player is teleported.
    pub fn reset(&mut self) {
        self.deltas.clear();
        self.last_position = None;
    }

    /// Number of deltas held.
    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    pub fn last_position(&self) -> Option<Vec2> {
        self.last_position
    }

    /// Unit vector of the recency-weighted mean movement.
    pub fn predicted_direction(&self) -> Option<Vec2> {
        let weighted = self
            .deltas
            .iter()
            .enumerate()
            .fold(Vec2::ZERO, |acc, (i, delta)| acc + *delta * (i + 1) as f32);
        weighted.normalized(MIN_HEADING_LENGTH)
    }
}
