//! Simulated host collaborators.
//!
//! Stand-ins for the engine side of the streaming core: a loader with
//! configurable latency and scripted failures, a spawner that records what it
//! was asked to spawn, scripted input, a fixed inventory and a presenter that
//! logs what it would show.
//!
//! # Loader modes
//!
//! | Mode      | Load resolves                                        |
//! |-----------|------------------------------------------------------|
//! | immediate | on first poll                                        |
//! | latency   | after `tokio::time::sleep(latency)` (needs a runtime) |
//! | held      | when [`SimulatedLoader::complete_held`] is called    |

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info};

use super::traits::{
    BoxFuture, EntitySpawner, FrameInput, InputSource, Inventory, LoadedZoneHandle, LoaderError,
    TransitionPresenter, ZoneLoader,
};
use crate::coord::Vec2;
use crate::lifecycle::DetailLevel;
use crate::persistence::{DoorState, ZoneSnapshot};
use crate::registry::{TransitionDefinition, TransitionId, ZoneId};

pub use crate::prefetch::{ReducedPerformance, SteadyPerformance};

// ─────────────────────────────────────────────────────────────────────────────
// Loader
// ─────────────────────────────────────────────────────────────────────────────

/// A [`ZoneLoader`] that produces content out of thin air.
#[derive(Debug, Default)]
pub struct SimulatedLoader {
    latency: Duration,
    hold: bool,
    next_token: AtomicU64,
    failures: Mutex<HashMap<ZoneId, u32>>,
    calls: Mutex<Vec<(ZoneId, DetailLevel)>>,
    released: Mutex<Vec<LoadedZoneHandle>>,
    held: Mutex<Vec<(ZoneId, oneshot::Sender<()>)>>,
}

impl SimulatedLoader {
    /// A loader whose loads resolve on first poll.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every load by `latency` of tokio time.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Hold every load until [`complete_held`](Self::complete_held).
    pub fn held(mut self) -> Self {
        self.hold = true;
        self
    }

    /// Fail the next `count` loads of `zone`.
    pub fn fail_next(&self, zone: impl Into<ZoneId>, count: u32) {
        *self.failures.lock().entry(zone.into()).or_insert(0) += count;
    }

    /// Let every held load of `zone` resolve. Returns how many were released.
    pub fn complete_held(&self, zone: &ZoneId) -> usize {
        let ready: Vec<_> = {
            let mut held = self.held.lock();
            let (ready, waiting): (Vec<_>, Vec<_>) =
                held.drain(..).partition(|(id, _)| id == zone);
            *held = waiting;
            ready
        };
        let count = ready.len();
        for (_, sender) in ready {
            let _ = sender.send(());
        }
        count
    }

    /// Let every held load resolve.
    pub fn complete_all_held(&self) -> usize {
        let drained: Vec<_> = self.held.lock().drain(..).collect();
        let count = drained.len();
        for (_, sender) in drained {
            let _ = sender.send(());
        }
        count
    }

    /// Number of loads currently held.
    pub fn held_count(&self) -> usize {
        self.held.lock().len()
    }

    /// Every `load` call so far, in order.
    pub fn calls(&self) -> Vec<(ZoneId, DetailLevel)> {
        self.calls.lock().clone()
    }

    /// Number of `load` calls for `zone`.
    pub fn calls_for(&self, zone: &ZoneId) -> usize {
        self.calls.lock().iter().filter(|(id, _)| id == zone).count()
    }

    /// Handles passed to `release`, in order.
    pub fn released(&self) -> Vec<LoadedZoneHandle> {
        self.released.lock().clone()
    }

    fn take_failure(&self, zone: &ZoneId) -> bool {
        let mut failures = self.failures.lock();
        match failures.get_mut(zone) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

impl ZoneLoader for SimulatedLoader {
    fn load(
        &self,
        zone: &ZoneId,
        level: DetailLevel,
    ) -> BoxFuture<'static, Result<LoadedZoneHandle, LoaderError>> {
        self.calls.lock().push((zone.clone(), level));
        let fail = self.take_failure(zone);
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let latency = self.latency;

        let gate = if self.hold {
            let (tx, rx) = oneshot::channel();
            self.held.lock().push((zone.clone(), tx));
            Some(rx)
        } else {
            None
        };

        debug!(zone = %zone, level = %level, fail, "Simulated load started");

        let zone = zone.clone();
        Box::pin(async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            if fail {
                return Err(LoaderError::new(format!("simulated failure loading {}", zone)));
            }
            Ok(LoadedZoneHandle { zone, level, token })
        })
    }

    fn release(&self, handle: LoadedZoneHandle) {
        debug!(zone = %handle.zone, token = handle.token, "Simulated content released");
        self.released.lock().push(handle);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Spawner
// ─────────────────────────────────────────────────────────────────────────────

/// Something the spawner was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub enum SpawnEvent {
    Entity {
        zone: ZoneId,
        kind: String,
        position: Vec2,
        health: f32,
    },
    Item {
        zone: ZoneId,
        kind: String,
        position: Vec2,
        amount: u32,
    },
    Door {
        zone: ZoneId,
        door: String,
        state: DoorState,
    },
}

impl SpawnEvent {
    pub fn zone(&self) -> &ZoneId {
        match self {
            SpawnEvent::Entity { zone, .. }
            | SpawnEvent::Item { zone, .. }
            | SpawnEvent::Door { zone, .. } => zone,
        }
    }
}

/// An [`EntitySpawner`] that records spawns and serves preset live state.
#[derive(Debug, Default)]
pub struct RecordingSpawner {
    events: Mutex<Vec<SpawnEvent>>,
    live: Mutex<HashMap<ZoneId, ZoneSnapshot>>,
}

impl RecordingSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set what [`capture`](EntitySpawner::capture) returns for `zone`.
    pub fn set_live_state(&self, zone: impl Into<ZoneId>, snapshot: ZoneSnapshot) {
        self.live.lock().insert(zone.into(), snapshot);
    }

    /// Everything recorded so far.
    pub fn events(&self) -> Vec<SpawnEvent> {
        self.events.lock().clone()
    }

    /// Recorded events for one zone.
    pub fn events_for(&self, zone: &ZoneId) -> Vec<SpawnEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.zone() == zone)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EntitySpawner for RecordingSpawner {
    fn spawn_entity(&self, zone: &ZoneId, kind: &str, position: Vec2, health: f32) {
        self.events.lock().push(SpawnEvent::Entity {
            zone: zone.clone(),
            kind: kind.to_string(),
            position,
            health,
        });
    }

    fn spawn_item(&self, zone: &ZoneId, kind: &str, position: Vec2, amount: u32) {
        self.events.lock().push(SpawnEvent::Item {
            zone: zone.clone(),
            kind: kind.to_string(),
            position,
            amount,
        });
    }

    fn set_door(&self, zone: &ZoneId, door: &str, state: DoorState) {
        self.events.lock().push(SpawnEvent::Door {
            zone: zone.clone(),
            door: door.to_string(),
            state,
        });
    }

    fn capture(&self, zone: &ZoneId) -> Option<ZoneSnapshot> {
        self.live.lock().get(zone).cloned()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Input / inventory
// ─────────────────────────────────────────────────────────────────────────────

/// An [`InputSource`] replaying queued frames; idle once the queue is empty.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    frames: Mutex<VecDeque<FrameInput>>,
}

impl ScriptedInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one frame of input.
    pub fn push(&self, input: FrameInput) {
        self.frames.lock().push_back(input);
    }

    /// Queue `frames` frames with no input.
    pub fn push_idle(&self, frames: usize) {
        let mut queue = self.frames.lock();
        for _ in 0..frames {
            queue.push_back(FrameInput::default());
        }
    }

    /// Frames still queued.
    pub fn remaining(&self) -> usize {
        self.frames.lock().len()
    }
}

impl InputSource for ScriptedInput {
    fn poll(&self) -> FrameInput {
        self.frames.lock().pop_front().unwrap_or_default()
    }
}

/// An [`Inventory`] holding a mutable set of item names.
#[derive(Debug, Default)]
pub struct StaticInventory {
    items: Mutex<BTreeSet<String>>,
}

impl StaticInventory {
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            items: Mutex::new(items.into_iter().map(Into::into).collect()),
        }
    }

    pub fn give(&self, item: impl Into<String>) {
        self.items.lock().insert(item.into());
    }

    pub fn take(&self, item: &str) -> bool {
        self.items.lock().remove(item)
    }
}

impl Inventory for StaticInventory {
    fn has_item(&self, item: &str) -> bool {
        self.items.lock().contains(item)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Presenter
// ─────────────────────────────────────────────────────────────────────────────

/// Something the presenter was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub enum PresenterEvent {
    Shown(TransitionId),
    Placed(Vec2),
    Hidden(TransitionId),
    Notified(String),
    LoadingIndicator(bool),
}

/// A [`TransitionPresenter`] that records and logs every call.
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    events: Mutex<Vec<PresenterEvent>>,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PresenterEvent> {
        self.events.lock().clone()
    }

    /// Messages shown to the player.
    pub fn notifications(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                PresenterEvent::Notified(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    /// Last position the player was placed at.
    pub fn last_position(&self) -> Option<Vec2> {
        self.events.lock().iter().rev().find_map(|e| match e {
            PresenterEvent::Placed(position) => Some(*position),
            _ => None,
        })
    }

    /// Whether the blocking loading indicator is currently shown.
    pub fn loading_indicator_visible(&self) -> bool {
        self.events
            .lock()
            .iter()
            .rev()
            .find_map(|e| match e {
                PresenterEvent::LoadingIndicator(visible) => Some(*visible),
                _ => None,
            })
            .unwrap_or(false)
    }

    /// Whether any presentation is shown and not yet hidden.
    pub fn is_showing(&self) -> bool {
        let events = self.events.lock();
        let shown = events
            .iter()
            .filter(|e| matches!(e, PresenterEvent::Shown(_)))
            .count();
        let hidden = events
            .iter()
            .filter(|e| matches!(e, PresenterEvent::Hidden(_)))
            .count();
        shown > hidden
    }
}

impl TransitionPresenter for RecordingPresenter {
    fn show(&self, transition: &TransitionDefinition) {
        info!(transition = %transition.id, kind = transition.kind.name(), "Showing transition");
        self.events
            .lock()
            .push(PresenterEvent::Shown(transition.id.clone()));
    }

    fn place_player(&self, position: Vec2) {
        debug!(position = %position, "Placing player");
        self.events.lock().push(PresenterEvent::Placed(position));
    }

    fn hide(&self, transition: &TransitionDefinition) {
        info!(transition = %transition.id, "Hiding transition");
        self.events
            .lock()
            .push(PresenterEvent::Hidden(transition.id.clone()));
    }

    fn notify(&self, message: &str) {
        info!(message, "Player notification");
        self.events
            .lock()
            .push(PresenterEvent::Notified(message.to_string()));
    }

    fn set_loading_indicator(&self, visible: bool) {
        debug!(visible, "Loading indicator");
        self.events
            .lock()
            .push(PresenterEvent::LoadingIndicator(visible));
    }
}
