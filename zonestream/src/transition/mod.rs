//! Interactive zone-to-zone hand-offs.
//!
//! A hand-off hides a zone load behind gameplay: a corridor walk, an
//! elevator ride or a vent crawl. [`TransitionOrchestrator`] owns the shared
//! flow (lock guard, snapshot, deferred load, fallback, pruning); each kind
//! plugs in through [`TransitionSequence`].
//!
//! | Kind     | Load issued           | Commit                 | Cancel                      |
//! |----------|-----------------------|------------------------|-----------------------------|
//! | Corridor | on commit             | confirm near the exit  | confirm near entrance / cancel |
//! | Elevator | on commit             | confirm chosen stop    | cancel before confirm       |
//! | Vent     | immediately           | none                   | none                        |

mod corridor;
mod elevator;
mod orchestrator;
mod sequence;
mod vent;

pub use corridor::CorridorSequence;
pub use elevator::ElevatorSequence;
pub use orchestrator::{
    DeferredLoad, HandoffEvent, HandoffPhase, HandoffStats, TransitionOrchestrator,
    TransitionView, DEFAULT_KEEP_DEPTH,
};
pub use sequence::{SequenceFrame, SequenceSignal, TransitionSequence, ARRIVAL_EPSILON};
pub use vent::VentSequence;
