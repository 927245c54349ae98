//! Static transition definitions linking zones.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::zone::ZoneId;

/// Default half-width of the confirm regions at each end of a corridor.
pub const DEFAULT_CORRIDOR_PROXIMITY: f32 = 1.5;

/// Default elevator travel animation length in seconds.
pub const DEFAULT_ELEVATOR_TRAVEL_SECS: f32 = 4.0;

/// Longest elevator travel a world may define, in seconds.
pub const MAX_ELEVATOR_TRAVEL_SECS: f32 = 600.0;

/// Default vent cross-section width.
pub const DEFAULT_VENT_WIDTH: f32 = 1.0;

fn default_corridor_proximity() -> f32 {
    DEFAULT_CORRIDOR_PROXIMITY
}

fn default_elevator_travel_secs() -> f32 {
    DEFAULT_ELEVATOR_TRAVEL_SECS
}

fn default_vent_width() -> f32 {
    DEFAULT_VENT_WIDTH
}

/// Stable identifier of a transition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransitionId(String);

impl TransitionId {
    /// Create a transition id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransitionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Corridor walk parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorridorParams {
    /// Walk distance from entrance to exit.
    pub length: f32,

    /// Extent of the confirm region at each end.
    #[serde(default = "default_corridor_proximity")]
    pub proximity: f32,
}

impl CorridorParams {
    /// Corridor of the given length with the default proximity regions.
    pub fn new(length: f32) -> Self {
        Self {
            length,
            proximity: DEFAULT_CORRIDOR_PROXIMITY,
        }
    }
}

/// Elevator ride parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElevatorParams {
    /// Length of the travel animation after the destination is confirmed.
    #[serde(default = "default_elevator_travel_secs")]
    pub travel_secs: f32,
}

impl Default for ElevatorParams {
    fn default() -> Self {
        Self {
            travel_secs: DEFAULT_ELEVATOR_TRAVEL_SECS,
        }
    }
}

/// Vent crawl parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VentParams {
    /// Crawl distance from entry to exit.
    pub length: f32,

    /// Width of the shaft; lateral movement is clamped to half of it.
    #[serde(default = "default_vent_width")]
    pub width: f32,
}

impl VentParams {
    /// Vent of the given length with the default width.
    pub fn new(length: f32) -> Self {
        Self {
            length,
            width: DEFAULT_VENT_WIDTH,
        }
    }
}

/// Kind of interactive sequence a transition runs, with its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransitionKind {
    Corridor(CorridorParams),
    Elevator(ElevatorParams),
    Vent(VentParams),
}

impl TransitionKind {
    /// Short lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            TransitionKind::Corridor(_) => "corridor",
            TransitionKind::Elevator(_) => "elevator",
            TransitionKind::Vent(_) => "vent",
        }
    }

    /// Whether loading is held back until the player commits.
    pub fn defers_load(&self) -> bool {
        !matches!(self, TransitionKind::Vent(_))
    }

    /// Traversal distance for walked kinds.
    pub fn length(&self) -> Option<f32> {
        match self {
            TransitionKind::Corridor(p) => Some(p.length),
            TransitionKind::Vent(p) => Some(p.length),
            TransitionKind::Elevator(_) => None,
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named link between zones.
///
/// Corridors and vents join exactly two zones; elevators may serve more
/// stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionDefinition {
    pub id: TransitionId,

    #[serde(flatten)]
    pub kind: TransitionKind,

    /// Zones served by this transition (unordered).
    pub zones: Vec<ZoneId>,

    #[serde(default)]
    pub locked: bool,

    /// Item the player must hold to pass a locked transition.
    #[serde(default)]
    pub required_item: Option<String>,
}

impl TransitionDefinition {
    /// Create an unlocked transition.
    pub fn new(id: impl Into<TransitionId>, kind: TransitionKind, zones: Vec<ZoneId>) -> Self {
        Self {
            id: id.into(),
            kind,
            zones,
            locked: false,
            required_item: None,
        }
    }

    /// Lock the transition behind an item.
    pub fn locked_by(mut self, item: impl Into<String>) -> Self {
        self.locked = true;
        self.required_item = Some(item.into());
        self
    }

    /// Whether this transition serves `zone`.
    pub fn serves(&self, zone: &ZoneId) -> bool {
        self.zones.contains(zone)
    }

    /// Whether this transition links `a` and `b`.
    pub fn links(&self, a: &ZoneId, b: &ZoneId) -> bool {
        a != b && self.serves(a) && self.serves(b)
    }

    /// Zones reachable from `zone` through this transition.
    pub fn other_zones<'a>(&'a self, zone: &'a ZoneId) -> impl Iterator<Item = &'a ZoneId> + 'a {
        self.zones.iter().filter(move |z| *z != zone)
    }
}
