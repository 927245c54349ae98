//! Hand-off orchestration.
//!
//! Drives one interactive transition at a time through its lifecycle:
//!
//! ```text
//!   begin ──► guard (locked?) ──► persist from ──► show + place player
//!                                                      │
//!          ┌───────────── per frame: update ◄──────────┘
//!          │
//!          ├─ Cancel (before commit) ──► hide, nothing loaded ──► Cancelled
//!          │
//!          ├─ Commit(dest) ──► DeferredLoad::commit ──► load issued
//!          │
//!          ├─ load failed ──► one direct retry ──► failed again ──► hide ──► Failed
//!          │
//!          └─ committed && dest Full && sequence complete
//!                 ──► hide, activate dest, prune outside keep set ──► Completed
//! ```
//!
//! The destination is pinned against eviction for the life of the hand-off.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::corridor::CorridorSequence;
use super::elevator::ElevatorSequence;
use super::sequence::{SequenceFrame, SequenceSignal, TransitionSequence};
use super::vent::VentSequence;
use crate::coord::Vec2;
use crate::error::{ZoneError, ZoneResult};
use crate::host::{InputSource, Inventory, TransitionPresenter};
use crate::lifecycle::{DetailLevel, LoadTicket, ZoneLifecycle, ZoneState};
use crate::registry::{TransitionDefinition, TransitionId, TransitionKind, ZoneId};

/// Default graph depth kept resident around the destination after a hand-off.
pub const DEFAULT_KEEP_DEPTH: usize = 2;

// ─────────────────────────────────────────────────────────────────────────────
// Deferred load
// ─────────────────────────────────────────────────────────────────────────────

/// A destination load split into prepare and commit.
///
/// Preparing has no side effects; nothing is loaded or committed against the
/// budget until [`commit`](Self::commit). Cancelling a prepared load is just
/// dropping it.
#[derive(Debug)]
pub struct DeferredLoad {
    zone: ZoneId,
    level: DetailLevel,
    ticket: Option<LoadTicket>,
}

impl DeferredLoad {
    /// Describe a load without issuing it.
    pub fn prepare(zone: ZoneId, level: DetailLevel) -> Self {
        Self {
            zone,
            level,
            ticket: None,
        }
    }

    pub fn zone(&self) -> &ZoneId {
        &self.zone
    }

    pub fn level(&self) -> DetailLevel {
        self.level
    }

    pub fn is_committed(&self) -> bool {
        self.ticket.is_some()
    }

    /// The issued load, once committed.
    pub fn ticket(&self) -> Option<&LoadTicket> {
        self.ticket.as_ref()
    }

    /// Point the load at a different zone. Only possible before commit.
    pub fn retarget(&mut self, zone: ZoneId) -> bool {
        if self.is_committed() {
            return false;
        }
        self.zone = zone;
        true
    }

    /// Issue the load. Committing twice returns the same ticket.
    pub fn commit(&mut self, lifecycle: &ZoneLifecycle) -> ZoneResult<LoadTicket> {
        if let Some(ticket) = &self.ticket {
            return Ok(ticket.clone());
        }
        let ticket = lifecycle.request_load(&self.zone, self.level)?;
        self.ticket = Some(ticket.clone());
        Ok(ticket)
    }

    fn replace_ticket(&mut self, ticket: LoadTicket) {
        self.ticket = Some(ticket);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Events / views
// ─────────────────────────────────────────────────────────────────────────────

/// How a hand-off ended.
#[derive(Debug, Clone, PartialEq)]
pub enum HandoffEvent {
    /// The player arrived; `to` is now the active zone.
    Completed {
        transition: TransitionId,
        from: ZoneId,
        to: ZoneId,
        /// Zones unloaded for falling outside the keep set.
        pruned: Vec<ZoneId>,
    },
    /// The player backed out before committing. Nothing was loaded.
    Cancelled {
        transition: TransitionId,
        from: ZoneId,
        to: ZoneId,
    },
    /// The destination could not be loaded. The player stays in `from`.
    Failed {
        transition: TransitionId,
        from: ZoneId,
        to: ZoneId,
        error: ZoneError,
    },
}

impl HandoffEvent {
    pub fn transition(&self) -> &TransitionId {
        match self {
            HandoffEvent::Completed { transition, .. }
            | HandoffEvent::Cancelled { transition, .. }
            | HandoffEvent::Failed { transition, .. } => transition,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, HandoffEvent::Completed { .. })
    }
}

/// Progress of the in-flight hand-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffPhase {
    /// Sequence running, destination not requested.
    Gated,
    /// Destination load issued.
    Committed,
    /// The committed load failed once and a direct load is in flight.
    Retrying,
}

impl HandoffPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandoffPhase::Gated => "gated",
            HandoffPhase::Committed => "committed",
            HandoffPhase::Retrying => "retrying",
        }
    }
}

/// Read-only view of the in-flight hand-off.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionView {
    pub transition: TransitionId,
    pub kind: &'static str,
    pub from: ZoneId,
    pub to: ZoneId,
    pub phase: HandoffPhase,
    pub progress: f32,
    pub elapsed: Duration,
}

/// The hand-off currently being driven.
struct ActiveTransition {
    definition: TransitionDefinition,
    from: ZoneId,
    sequence: Box<dyn TransitionSequence>,
    load: DeferredLoad,
    phase: HandoffPhase,
    elapsed: Duration,
}

impl ActiveTransition {
    fn to(&self) -> &ZoneId {
        self.load.zone()
    }

    fn view(&self) -> TransitionView {
        TransitionView {
            transition: self.definition.id.clone(),
            kind: self.sequence.kind(),
            from: self.from.clone(),
            to: self.to().clone(),
            phase: self.phase,
            progress: self.sequence.progress(),
            elapsed: self.elapsed,
        }
    }
}

/// Counters describing hand-off outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HandoffStats {
    pub started: u64,
    pub completed: u64,
    pub cancelled: u64,
    pub failed: u64,
    pub retries: u64,
    pub locked_refusals: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ─────────────────────────────────────────────────────────────────────────────

/// Runs interactive hand-offs between zones.
pub struct TransitionOrchestrator {
    lifecycle: ZoneLifecycle,
    presenter: Arc<dyn TransitionPresenter>,
    inventory: Arc<dyn Inventory>,
    input: Arc<dyn InputSource>,
    keep_depth: usize,
    active: Option<ActiveTransition>,
    stats: HandoffStats,
}

impl TransitionOrchestrator {
    pub fn new(
        lifecycle: ZoneLifecycle,
        presenter: Arc<dyn TransitionPresenter>,
        inventory: Arc<dyn Inventory>,
        input: Arc<dyn InputSource>,
    ) -> Self {
        Self {
            lifecycle,
            presenter,
            inventory,
            input,
            keep_depth: DEFAULT_KEEP_DEPTH,
            active: None,
            stats: HandoffStats::default(),
        }
    }

    /// Set how far from the destination resident zones survive a hand-off.
    pub fn with_keep_depth(mut self, depth: usize) -> Self {
        self.keep_depth = depth;
        self
    }

    pub fn keep_depth(&self) -> usize {
        self.keep_depth
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// The in-flight hand-off, if any.
    pub fn active(&self) -> Option<TransitionView> {
        self.active.as_ref().map(ActiveTransition::view)
    }

    pub fn stats(&self) -> &HandoffStats {
        &self.stats
    }

    /// Start a hand-off from `from` to `to` through `definition`.
    ///
    /// # Errors
    ///
    /// - `TransitionInProgress` if a hand-off is already running
    /// - `TransitionLocked` if the player lacks the required item; the
    ///   presenter is told why and nothing else changes
    /// - any error from issuing an immediate (vent) load
    pub fn begin(
        &mut self,
        definition: &TransitionDefinition,
        from: &ZoneId,
        to: &ZoneId,
    ) -> ZoneResult<()> {
        if self.active.is_some() {
            return Err(ZoneError::TransitionInProgress);
        }

        if definition.locked {
            let item = definition.required_item.clone().unwrap_or_default();
            if !self.inventory.has_item(&item) {
                let error = ZoneError::TransitionLocked {
                    transition: definition.id.clone(),
                    item,
                };
                if let Some(message) = error.user_message() {
                    self.presenter.notify(&message);
                }
                self.stats.locked_refusals += 1;
                info!(transition = %definition.id, "Transition locked");
                return Err(error);
            }
        }

        self.lifecycle.persist(from);

        let mut sequence = build_sequence(definition, from, to);
        let mut load = DeferredLoad::prepare(to.clone(), DetailLevel::Full);
        let mut phase = HandoffPhase::Gated;

        if !definition.kind.defers_load() {
            load.commit(&self.lifecycle)?;
            phase = HandoffPhase::Committed;
        }
        self.lifecycle.pin(to);

        self.presenter.show(definition);
        let entry = sequence.activate();
        self.presenter.place_player(entry);

        info!(
            transition = %definition.id,
            kind = sequence.kind(),
            from = %from,
            to = %to,
            "Hand-off started"
        );

        self.stats.started += 1;
        self.active = Some(ActiveTransition {
            definition: definition.clone(),
            from: from.clone(),
            sequence,
            load,
            phase,
            elapsed: Duration::ZERO,
        });
        Ok(())
    }

    /// Advance the in-flight hand-off by one frame.
    ///
    /// `position` is the player's position in the sequence's local space.
    /// Returns an event when the hand-off ends this frame.
    pub fn update(&mut self, dt: Duration, position: Vec2) -> Option<HandoffEvent> {
        let mut active = self.active.take()?;
        active.elapsed += dt;

        let input = self.input.poll();
        let position = match active.sequence.constrain(position) {
            Some(corrected) => {
                self.presenter.place_player(corrected);
                corrected
            }
            None => position,
        };

        let frame = SequenceFrame {
            dt,
            input,
            position,
        };

        match active.sequence.update(&frame) {
            SequenceSignal::Continue => {}
            SequenceSignal::Cancel if active.phase == HandoffPhase::Gated => {
                return Some(self.cancel(active));
            }
            SequenceSignal::Cancel => {
                debug!(transition = %active.definition.id, "Cancel ignored after commit");
            }
            SequenceSignal::Commit(destination) => {
                if let Err(error) = self.commit(&mut active, destination) {
                    return self.retry_or_fail(active, error);
                }
            }
        }

        let mut ready = false;
        if let Some(ticket) = active.load.ticket() {
            match ticket.poll_now() {
                Some(Ok(_)) => {
                    ready = self.lifecycle.state(active.to()) == Some(ZoneState::Full);
                }
                Some(Err(error)) => return self.retry_or_fail(active, error),
                None => {}
            }
        }

        if active.sequence.check_completion(ready) {
            return Some(self.complete(active));
        }

        self.active = Some(active);
        None
    }

    fn commit(&mut self, active: &mut ActiveTransition, destination: ZoneId) -> ZoneResult<()> {
        if active.load.is_committed() {
            return Ok(());
        }
        if &destination != active.to() {
            self.lifecycle.unpin(active.to());
            self.lifecycle.pin(&destination);
            active.load.retarget(destination);
        }
        info!(
            transition = %active.definition.id,
            to = %active.to(),
            "Hand-off committed"
        );
        active.phase = HandoffPhase::Committed;
        active.load.commit(&self.lifecycle).map(|_| ())
    }

    /// After a failed commit: issue one direct load, then give up.
    fn retry_or_fail(
        &mut self,
        mut active: ActiveTransition,
        error: ZoneError,
    ) -> Option<HandoffEvent> {
        if active.phase != HandoffPhase::Retrying {
            warn!(
                transition = %active.definition.id,
                to = %active.to(),
                error = %error,
                "Destination load failed, retrying with a direct load"
            );
            self.stats.retries += 1;
            active.phase = HandoffPhase::Retrying;
            match self.lifecycle.request_load(active.to(), DetailLevel::Full) {
                Ok(ticket) => {
                    active.load.replace_ticket(ticket);
                    self.active = Some(active);
                    return None;
                }
                Err(retry_error) => return Some(self.fail(active, retry_error)),
            }
        }
        Some(self.fail(active, error))
    }

    fn fail(&mut self, mut active: ActiveTransition, error: ZoneError) -> HandoffEvent {
        warn!(
            transition = %active.definition.id,
            from = %active.from,
            to = %active.to(),
            error = %error,
            "Hand-off failed, staying in origin zone"
        );
        self.teardown(&mut active);
        self.stats.failed += 1;
        HandoffEvent::Failed {
            transition: active.definition.id.clone(),
            from: active.from.clone(),
            to: active.to().clone(),
            error,
        }
    }

    fn cancel(&mut self, mut active: ActiveTransition) -> HandoffEvent {
        info!(transition = %active.definition.id, "Hand-off cancelled");
        self.teardown(&mut active);
        self.stats.cancelled += 1;
        HandoffEvent::Cancelled {
            transition: active.definition.id.clone(),
            from: active.from.clone(),
            to: active.to().clone(),
        }
    }

    fn complete(&mut self, mut active: ActiveTransition) -> HandoffEvent {
        self.teardown(&mut active);
        let to = active.to().clone();

        if let Err(e) = self.lifecycle.set_active(&to) {
            warn!(zone = %to, error = %e, "Failed to activate destination");
        }

        let keep: BTreeSet<ZoneId> = self
            .lifecycle
            .registry()
            .connected_zones(&to, self.keep_depth);
        let pruned = self.lifecycle.prune(&keep);

        info!(
            transition = %active.definition.id,
            from = %active.from,
            to = %to,
            pruned = pruned.len(),
            elapsed_ms = active.elapsed.as_millis() as u64,
            "Hand-off completed"
        );
        self.stats.completed += 1;
        HandoffEvent::Completed {
            transition: active.definition.id.clone(),
            from: active.from.clone(),
            to,
            pruned,
        }
    }

    fn teardown(&mut self, active: &mut ActiveTransition) {
        self.presenter.hide(&active.definition);
        active.sequence.deactivate();
        self.lifecycle.unpin(active.to());
    }
}

impl std::fmt::Debug for TransitionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionOrchestrator")
            .field("keep_depth", &self.keep_depth)
            .field("active", &self.active())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

fn build_sequence(
    definition: &TransitionDefinition,
    from: &ZoneId,
    to: &ZoneId,
) -> Box<dyn TransitionSequence> {
    match definition.kind {
        TransitionKind::Corridor(params) => Box::new(CorridorSequence::new(params, to.clone())),
        TransitionKind::Elevator(params) => {
            let stops = definition.other_zones(from).cloned().collect();
            Box::new(ElevatorSequence::new(params, stops, to))
        }
        TransitionKind::Vent(params) => Box::new(VentSequence::new(params)),
    }
}
