//! Corridor hand-off: a one-dimensional walk between two zones.
//!
//! # State Machine
//!
//! ```text
//!              confirm near exit
//!   Walking ---------------------> Committed ---> (complete when destination ready)
//!      |
//!      | confirm near entrance / cancel input
//!      v
//!   Cancelled
//! ```
//!
//! The corridor runs along +x from `0` (entrance) to `length` (exit). The
//! player is kept on the centre line.

use crate::coord::Vec2;
use crate::registry::{CorridorParams, ZoneId};

use super::sequence::{SequenceFrame, SequenceSignal, TransitionSequence};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CorridorPhase {
    Idle,
    Walking,
    Committed,
    Cancelled,
}

/// Walk-through corridor between two zones.
#[derive(Debug)]
pub struct CorridorSequence {
    params: CorridorParams,
    destination: ZoneId,
    phase: CorridorPhase,
    position: f32,
}

impl CorridorSequence {
    pub fn new(params: CorridorParams, destination: ZoneId) -> Self {
        Self {
            params,
            destination,
            phase: CorridorPhase::Idle,
            position: 0.0,
        }
    }

    fn near_entrance(&self) -> bool {
        self.position <= self.params.proximity
    }

    fn near_exit(&self) -> bool {
        self.position >= self.params.length - self.params.proximity
    }

    pub fn is_committed(&self) -> bool {
        self.phase == CorridorPhase::Committed
    }
}

impl TransitionSequence for CorridorSequence {
    fn kind(&self) -> &'static str {
        "corridor"
    }

    fn activate(&mut self) -> Vec2 {
        self.phase = CorridorPhase::Walking;
        self.position = 0.0;
        Vec2::ZERO
    }

    fn constrain(&self, position: Vec2) -> Option<Vec2> {
        let clamped = Vec2::new(position.x.clamp(0.0, self.params.length), 0.0);
        (clamped != position).then_some(clamped)
    }

    fn update(&mut self, frame: &SequenceFrame) -> SequenceSignal {
        if self.phase != CorridorPhase::Walking && self.phase != CorridorPhase::Committed {
            return SequenceSignal::Continue;
        }
        self.position = frame.position.x.clamp(0.0, self.params.length);

        if self.phase == CorridorPhase::Committed {
            return SequenceSignal::Continue;
        }

        if frame.input.cancel {
            self.phase = CorridorPhase::Cancelled;
            return SequenceSignal::Cancel;
        }
        if frame.input.confirm {
            // Exit first: in a corridor shorter than both regions, confirm goes forward
            if self.near_exit() {
                self.phase = CorridorPhase::Committed;
                return SequenceSignal::Commit(self.destination.clone());
            }
            if self.near_entrance() {
                self.phase = CorridorPhase::Cancelled;
                return SequenceSignal::Cancel;
            }
        }
        SequenceSignal::Continue
    }

    fn check_completion(&self, destination_ready: bool) -> bool {
        self.phase == CorridorPhase::Committed && destination_ready
    }

    fn progress(&self) -> f32 {
        if self.params.length <= 0.0 {
            return 1.0;
        }
        (self.position / self.params.length).clamp(0.0, 1.0)
    }

    fn deactivate(&mut self) {
        self.phase = CorridorPhase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::FrameInput;
    use crate::transition::sequence::testing::{frame, idle};

    fn corridor() -> CorridorSequence {
        let mut sequence = CorridorSequence::new(CorridorParams::new(10.0), "b".into());
        assert_eq!(sequence.activate(), Vec2::ZERO);
        sequence
    }

    #[test]
    fn test_confirm_at_exit_commits() {
        let mut sequence = corridor();
        assert_eq!(sequence.update(&idle(Vec2::new(5.0, 0.0))), SequenceSignal::Continue);

        let signal = sequence.update(&frame(FrameInput::confirm(), Vec2::new(9.0, 0.0)));

        assert_eq!(signal, SequenceSignal::Commit("b".into()));
        assert!(!sequence.check_completion(false));
        assert!(sequence.check_completion(true));
    }

    #[test]
    fn test_confirm_at_entrance_cancels() {
        let mut sequence = corridor();
        let signal = sequence.update(&frame(FrameInput::confirm(), Vec2::new(1.0, 0.0)));
        assert_eq!(signal, SequenceSignal::Cancel);
        assert!(!sequence.check_completion(true));
    }

    #[test]
    fn test_confirm_mid_corridor_does_nothing() {
        let mut sequence = corridor();
        let signal = sequence.update(&frame(FrameInput::confirm(), Vec2::new(5.0, 0.0)));
        assert_eq!(signal, SequenceSignal::Continue);
    }

    #[test]
    fn test_cancel_input_before_commit() {
        let mut sequence = corridor();
        let signal = sequence.update(&frame(FrameInput::cancel(), Vec2::new(5.0, 0.0)));
        assert_eq!(signal, SequenceSignal::Cancel);
    }

    #[test]
    fn test_cancel_ignored_after_commit() {
        let mut sequence = corridor();
        sequence.update(&frame(FrameInput::confirm(), Vec2::new(10.0, 0.0)));

        let signal = sequence.update(&frame(FrameInput::cancel(), Vec2::new(10.0, 0.0)));

        assert_eq!(signal, SequenceSignal::Continue);
        assert!(sequence.is_committed());
    }

    #[test]
    fn test_constrain_to_centre_line() {
        let sequence = corridor();
        assert_eq!(sequence.constrain(Vec2::new(3.0, 0.0)), None);
        assert_eq!(
            sequence.constrain(Vec2::new(12.0, 2.0)),
            Some(Vec2::new(10.0, 0.0))
        );
        assert_eq!(
            sequence.constrain(Vec2::new(-1.0, 0.0)),
            Some(Vec2::new(0.0, 0.0))
        );
    }

    #[test]
    fn test_progress() {
        let mut sequence = corridor();
        sequence.update(&idle(Vec2::new(2.5, 0.0)));
        assert!((sequence.progress() - 0.25).abs() < f32::EPSILON);
    }
}
