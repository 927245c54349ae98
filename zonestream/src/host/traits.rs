//! Capabilities the streaming core consumes from its host.
//!
//! The core never touches meshes, disks, input devices or rendering. It asks
//! the host through these traits instead, so the same manager runs inside a
//! game, a headless simulation or a unit test.
//!
//! # Dyn Compatibility
//!
//! All traits are object safe and `Send + Sync`; the manager stores them as
//! `Arc<dyn Trait>`. Async loading uses a boxed future, following the same
//! shape as any other dyn-compatible async interface.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::coord::Vec2;
use crate::lifecycle::DetailLevel;
use crate::persistence::{DoorState, ZoneSnapshot};
use crate::registry::{TransitionDefinition, ZoneId};

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ─────────────────────────────────────────────────────────────────────────────
// Loader
// ─────────────────────────────────────────────────────────────────────────────

/// Failure reported by a [`ZoneLoader`].
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message}")]
pub struct LoaderError {
    pub message: String,
}

impl LoaderError {
    /// Create a loader error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Opaque handle to zone content made resident by the loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedZoneHandle {
    pub zone: ZoneId,
    pub level: DetailLevel,
    /// Loader-defined token identifying the resident content.
    pub token: u64,
}

/// Makes zone content resident at a requested detail level.
pub trait ZoneLoader: Send + Sync {
    /// Load `zone` at `level`.
    ///
    /// The returned future must not borrow the loader; it may be polled from
    /// the host's frame loop long after this call returns.
    fn load(
        &self,
        zone: &ZoneId,
        level: DetailLevel,
    ) -> BoxFuture<'static, Result<LoadedZoneHandle, LoaderError>>;

    /// Release content previously returned by [`load`](Self::load).
    fn release(&self, handle: LoadedZoneHandle);
}

// ─────────────────────────────────────────────────────────────────────────────
// Entity restore / capture
// ─────────────────────────────────────────────────────────────────────────────

/// Recreates and captures the mutable contents of a zone.
pub trait EntitySpawner: Send + Sync {
    /// Spawn a saved entity.
    fn spawn_entity(&self, zone: &ZoneId, kind: &str, position: Vec2, health: f32);

    /// Spawn a saved item stack.
    fn spawn_item(&self, zone: &ZoneId, kind: &str, position: Vec2, amount: u32);

    /// Apply a saved door state.
    fn set_door(&self, zone: &ZoneId, door: &str, state: DoorState);

    /// Capture the live state of a zone for saving.
    ///
    /// Returns `None` when the host holds nothing worth persisting.
    fn capture(&self, zone: &ZoneId) -> Option<ZoneSnapshot> {
        let _ = zone;
        None
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Key/value persistence
// ─────────────────────────────────────────────────────────────────────────────

/// Errors from a [`KeyValueStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error in the backing medium.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend-specific failure.
    #[error("store error: {0}")]
    Backend(String),
}

/// Byte-oriented key/value storage.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    /// Delete `key`. Returns whether it existed.
    fn delete(&self, key: &str) -> Result<bool, StoreError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Input / inventory
// ─────────────────────────────────────────────────────────────────────────────

/// Discrete input signals for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameInput {
    /// The player pressed confirm this frame.
    pub confirm: bool,

    /// The player pressed cancel this frame.
    pub cancel: bool,

    /// Elevator stop chosen this frame (index into the offered stops).
    pub select: Option<usize>,
}

impl FrameInput {
    /// A frame with confirm pressed.
    pub fn confirm() -> Self {
        Self {
            confirm: true,
            ..Self::default()
        }
    }

    /// A frame with cancel pressed.
    pub fn cancel() -> Self {
        Self {
            cancel: true,
            ..Self::default()
        }
    }

    /// A frame selecting an elevator stop.
    pub fn select(index: usize) -> Self {
        Self {
            select: Some(index),
            ..Self::default()
        }
    }
}

/// Per-frame input polled by the transition orchestrator.
pub trait InputSource: Send + Sync {
    /// Signals for the current frame.
    fn poll(&self) -> FrameInput;
}

/// Answers whether the player holds an item.
pub trait Inventory: Send + Sync {
    fn has_item(&self, item: &str) -> bool;
}

// ─────────────────────────────────────────────────────────────────────────────
// Presentation
// ─────────────────────────────────────────────────────────────────────────────

/// Host-side representation of transitions and loading feedback.
pub trait TransitionPresenter: Send + Sync {
    /// Instantiate the transition's interactive geometry.
    fn show(&self, transition: &TransitionDefinition);

    /// Move the player (transition-local coordinates while a hand-off runs).
    fn place_player(&self, position: Vec2);

    /// Tear down the transition's geometry.
    fn hide(&self, transition: &TransitionDefinition);

    /// Show a short message to the player.
    fn notify(&self, message: &str);

    /// Toggle the blocking loading indicator used for loads outside hand-offs.
    fn set_loading_indicator(&self, visible: bool) {
        let _ = visible;
    }
}
