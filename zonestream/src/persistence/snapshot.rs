//! Mutable per-zone play state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::coord::Vec2;

/// Saved state of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub kind: String,
    pub position: Vec2,
    pub health: f32,
    pub alive: bool,
}

impl EntityState {
    /// Create an entity record.
    pub fn new(kind: impl Into<String>, position: Vec2, health: f32, alive: bool) -> Self {
        Self {
            kind: kind.into(),
            position,
            health,
            alive,
        }
    }
}

/// Saved state of one item stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemState {
    pub kind: String,
    pub position: Vec2,
    pub quantity: u32,
}

impl ItemState {
    /// Create an item record.
    pub fn new(kind: impl Into<String>, position: Vec2, quantity: u32) -> Self {
        Self {
            kind: kind.into(),
            position,
            quantity,
        }
    }
}

/// Saved state of one door.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorState {
    pub open: bool,
    pub locked: bool,
}

/// Mutable contents of a zone: entities, items and doors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneSnapshot {
    pub entities: Vec<EntityState>,
    pub items: Vec<ItemState>,
    pub doors: BTreeMap<String, DoorState>,
}

impl ZoneSnapshot {
    /// Empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity.
    pub fn with_entity(mut self, entity: EntityState) -> Self {
        self.entities.push(entity);
        self
    }

    /// Add an item stack.
    pub fn with_item(mut self, item: ItemState) -> Self {
        self.items.push(item);
        self
    }

    /// Set a door state.
    pub fn with_door(mut self, door: impl Into<String>, state: DoorState) -> Self {
        self.doors.insert(door.into(), state);
        self
    }

    /// Entities that should be respawned.
    pub fn living_entities(&self) -> impl Iterator<Item = &EntityState> {
        self.entities.iter().filter(|e| e.alive)
    }

    /// Whether the snapshot records nothing.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.items.is_empty() && self.doors.is_empty()
    }
}
