//! The per-kind interactive part of a hand-off.
//!
//! Each transition kind drives its own little state machine inside a shared
//! frame loop. The orchestrator owns loading, presentation and fallback; a
//! sequence only decides, frame by frame, whether the player has committed to
//! a destination, backed out, or arrived.

use std::time::Duration;

use crate::coord::Vec2;
use crate::host::FrameInput;
use crate::registry::ZoneId;

/// Positions within this distance of a sequence's end count as arrived.
pub const ARRIVAL_EPSILON: f32 = 0.05;

/// One frame of input to a sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequenceFrame {
    /// Time since the previous frame.
    pub dt: Duration,
    /// Player input this frame.
    pub input: FrameInput,
    /// Player position in the sequence's local space, already constrained.
    pub position: Vec2,
}

/// What a sequence decided this frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceSignal {
    /// Nothing changed.
    Continue,
    /// The player committed to travelling to this zone.
    Commit(ZoneId),
    /// The player backed out before committing.
    Cancel,
}

/// Interactive hand-off behaviour for one transition kind.
///
/// Sequences work in their own local space: the entry point is where
/// [`activate`](Self::activate) places the player, and positions passed to
/// [`update`](Self::update) are relative to it.
pub trait TransitionSequence: Send {
    /// Kind name for logging.
    fn kind(&self) -> &'static str;

    /// Start the sequence. Returns the player's entry position.
    fn activate(&mut self) -> Vec2;

    /// Clamp `position` to the space the player may occupy.
    ///
    /// Returns the corrected position when it had to move.
    fn constrain(&self, position: Vec2) -> Option<Vec2> {
        let _ = position;
        None
    }

    /// Advance one frame.
    fn update(&mut self, frame: &SequenceFrame) -> SequenceSignal;

    /// Whether the hand-off may finish, given that the destination is ready.
    fn check_completion(&self, destination_ready: bool) -> bool;

    /// Completion fraction in `0.0..=1.0`, for display.
    fn progress(&self) -> f32;

    /// Tear down sequence state. Called exactly once, on every exit path.
    fn deactivate(&mut self);
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub fn frame(input: FrameInput, position: Vec2) -> SequenceFrame {
        SequenceFrame {
            dt: Duration::from_millis(16),
            input,
            position,
        }
    }

    pub fn idle(position: Vec2) -> SequenceFrame {
        frame(FrameInput::default(), position)
    }

    pub fn timed(dt: Duration, input: FrameInput) -> SequenceFrame {
        SequenceFrame {
            dt,
            input,
            position: Vec2::ZERO,
        }
    }
}
