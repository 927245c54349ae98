//! Elevator hand-off: pick a floor, ride, arrive.
//!
//! # State Machine
//!
//! ```text
//!                confirm                travel_secs elapsed
//!   Choosing -------------> Travelling ---------------------> Arrived
//!      |  select(i): change stop                (complete when destination ready)
//!      | cancel
//!      v
//!   Cancelled
//! ```
//!
//! Stops are the zones served by the elevator other than the one the player
//! boards from, in authored order. The proposed destination is preselected.

use std::time::Duration;

use tracing::debug;

use crate::coord::Vec2;
use crate::registry::{ElevatorParams, ZoneId, MAX_ELEVATOR_TRAVEL_SECS};

use super::sequence::{SequenceFrame, SequenceSignal, TransitionSequence};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElevatorPhase {
    Idle,
    Choosing,
    Travelling,
    Arrived,
    Cancelled,
}

/// Multi-stop elevator.
#[derive(Debug)]
pub struct ElevatorSequence {
    travel: Duration,
    stops: Vec<ZoneId>,
    selected: usize,
    phase: ElevatorPhase,
    elapsed: Duration,
}

impl ElevatorSequence {
    /// Elevator boarding towards `stops`, with `proposed` preselected.
    pub fn new(params: ElevatorParams, stops: Vec<ZoneId>, proposed: &ZoneId) -> Self {
        let selected = stops.iter().position(|s| s == proposed).unwrap_or(0);
        Self {
            travel: Duration::from_secs_f32(
                params.travel_secs.max(0.0).min(MAX_ELEVATOR_TRAVEL_SECS),
            ),
            stops,
            selected,
            phase: ElevatorPhase::Idle,
            elapsed: Duration::ZERO,
        }
    }

    /// Available stops.
    pub fn stops(&self) -> &[ZoneId] {
        &self.stops
    }

    /// Currently selected stop.
    pub fn selected(&self) -> Option<&ZoneId> {
        self.stops.get(self.selected)
    }

    pub fn has_arrived(&self) -> bool {
        self.phase == ElevatorPhase::Arrived
    }
}

impl TransitionSequence for ElevatorSequence {
    fn kind(&self) -> &'static str {
        "elevator"
    }

    fn activate(&mut self) -> Vec2 {
        self.phase = ElevatorPhase::Choosing;
        self.elapsed = Duration::ZERO;
        Vec2::ZERO
    }

    fn constrain(&self, position: Vec2) -> Option<Vec2> {
        (position != Vec2::ZERO).then_some(Vec2::ZERO)
    }

    fn update(&mut self, frame: &SequenceFrame) -> SequenceSignal {
        match self.phase {
            ElevatorPhase::Choosing => {
                if let Some(index) = frame.input.select {
                    if index < self.stops.len() && index != self.selected {
                        self.selected = index;
                        debug!(stop = %self.stops[index], "Elevator stop selected");
                    }
                }
                if frame.input.cancel {
                    self.phase = ElevatorPhase::Cancelled;
                    return SequenceSignal::Cancel;
                }
                if frame.input.confirm {
                    if let Some(stop) = self.stops.get(self.selected) {
                        self.phase = ElevatorPhase::Travelling;
                        return SequenceSignal::Commit(stop.clone());
                    }
                }
                SequenceSignal::Continue
            }
            ElevatorPhase::Travelling => {
                self.elapsed += frame.dt;
                if self.elapsed >= self.travel {
                    self.phase = ElevatorPhase::Arrived;
                }
                SequenceSignal::Continue
            }
            _ => SequenceSignal::Continue,
        }
    }

    fn check_completion(&self, destination_ready: bool) -> bool {
        self.phase == ElevatorPhase::Arrived && destination_ready
    }

    fn progress(&self) -> f32 {
        match self.phase {
            ElevatorPhase::Arrived => 1.0,
            ElevatorPhase::Travelling if !self.travel.is_zero() => {
                (self.elapsed.as_secs_f32() / self.travel.as_secs_f32()).min(1.0)
            }
            _ => 0.0,
        }
    }

    fn deactivate(&mut self) {
        self.phase = ElevatorPhase::Idle;
    }
}
