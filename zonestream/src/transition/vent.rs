//! Vent hand-off: crawl through a narrow shaft.
//!
//! Vents have no choice and no commit gate: the destination starts loading
//! the moment the player enters. Lateral movement is clamped to the shaft
//! width; the hand-off completes once the player reaches the far end and the
//! destination is ready.

use crate::coord::Vec2;
use crate::registry::VentParams;

use super::sequence::{SequenceFrame, SequenceSignal, TransitionSequence, ARRIVAL_EPSILON};

/// Crawl-through vent between two zones.
#[derive(Debug)]
pub struct VentSequence {
    params: VentParams,
    active: bool,
    position: Vec2,
}

impl VentSequence {
    pub fn new(params: VentParams) -> Self {
        Self {
            params,
            active: false,
            position: Vec2::ZERO,
        }
    }

    fn half_width(&self) -> f32 {
        (self.params.width / 2.0).max(0.0)
    }

    pub fn reached_end(&self) -> bool {
        self.position.x >= self.params.length - ARRIVAL_EPSILON
    }
}

impl TransitionSequence for VentSequence {
    fn kind(&self) -> &'static str {
        "vent"
    }

    fn activate(&mut self) -> Vec2 {
        self.active = true;
        self.position = Vec2::ZERO;
        self.position
    }

    fn constrain(&self, position: Vec2) -> Option<Vec2> {
        let half = self.half_width();
        let clamped = Vec2::new(
            position.x.clamp(0.0, self.params.length),
            position.y.clamp(-half, half),
        );
        (clamped != position).then_some(clamped)
    }

    fn update(&mut self, frame: &SequenceFrame) -> SequenceSignal {
        if self.active {
            self.position = self.constrain(frame.position).unwrap_or(frame.position);
        }
        SequenceSignal::Continue
    }

    fn check_completion(&self, destination_ready: bool) -> bool {
        self.active && destination_ready && self.reached_end()
    }

    fn progress(&self) -> f32 {
        if self.params.length <= 0.0 {
            return 1.0;
        }
        (self.position.x / self.params.length).clamp(0.0, 1.0)
    }

    fn deactivate(&mut self) {
        self.active = false;
    }
}
