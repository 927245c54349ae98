//! Zone registry and transition definitions.
//!
//! Pure lookup tables populated once at startup. The registry validates the
//! authored layout (unique ids, transitions referencing known zones, sane
//! parameters) and precomputes the adjacency graph used by the prefetcher and
//! by post-hand-off pruning.
//!
//! # Example
//!
//! ```
//! use zonestream::registry::{
//!     CorridorParams, SizeCategory, TransitionDefinition, TransitionKind, ZoneDefinition,
//!     ZoneId, ZoneRegistry,
//! };
//!
//! let registry = ZoneRegistry::new(
//!     vec![
//!         ZoneDefinition::new("a", SizeCategory::Large),
//!         ZoneDefinition::new("b", SizeCategory::Medium),
//!     ],
//!     vec![TransitionDefinition::new(
//!         "a-b",
//!         TransitionKind::Corridor(CorridorParams::new(10.0)),
//!         vec!["a".into(), "b".into()],
//!     )],
//! )
//! .unwrap();
//!
//! assert!(registry.adjacent_zones(&ZoneId::from("a")).contains(&ZoneId::from("b")));
//! ```

mod transition;
mod world;
mod zone;

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::PathBuf;

use thiserror::Error;

pub use transition::{
    CorridorParams, ElevatorParams, TransitionDefinition, TransitionId, TransitionKind, VentParams,
    DEFAULT_CORRIDOR_PROXIMITY, DEFAULT_ELEVATOR_TRAVEL_SECS, DEFAULT_VENT_WIDTH,
    MAX_ELEVATOR_TRAVEL_SECS,
};
pub use world::WorldDefinition;
pub use zone::{SizeCategory, ZoneDefinition, ZoneId, MB};

/// Default depth bound for [`ZoneRegistry::connected_zones`].
pub const DEFAULT_CONNECTED_DEPTH: usize = 2;

/// Errors raised while building a registry from authored data.
#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("duplicate zone id: {0}")]
    DuplicateZone(ZoneId),

    #[error("duplicate transition id: {0}")]
    DuplicateTransition(TransitionId),

    #[error("transition {transition} references unknown zone {zone}")]
    UnknownZone {
        transition: TransitionId,
        zone: ZoneId,
    },

    #[error("transition {transition} is invalid: {reason}")]
    InvalidTransition {
        transition: TransitionId,
        reason: String,
    },

    #[error("failed to read world file {}: {reason}", path.display())]
    Read { path: PathBuf, reason: String },

    #[error("failed to parse world definition: {0}")]
    Parse(String),
}

/// Static lookup tables for zones and transitions.
#[derive(Debug, Clone)]
pub struct ZoneRegistry {
    zones: HashMap<ZoneId, ZoneDefinition>,
    transitions: HashMap<TransitionId, TransitionDefinition>,
    /// Transitions touching each zone.
    connections: HashMap<ZoneId, BTreeSet<TransitionId>>,
}

impl ZoneRegistry {
    /// Validate definitions and build the registry.
    pub fn new(
        zones: Vec<ZoneDefinition>,
        transitions: Vec<TransitionDefinition>,
    ) -> Result<Self, RegistryError> {
        let mut zone_map = HashMap::with_capacity(zones.len());
        let mut connections: HashMap<ZoneId, BTreeSet<TransitionId>> = HashMap::new();

        for zone in zones {
            if zone_map.contains_key(&zone.id) {
                return Err(RegistryError::DuplicateZone(zone.id));
            }
            connections.insert(zone.id.clone(), BTreeSet::new());
            zone_map.insert(zone.id.clone(), zone);
        }

        let mut transition_map = HashMap::with_capacity(transitions.len());
        for transition in transitions {
            if transition_map.contains_key(&transition.id) {
                return Err(RegistryError::DuplicateTransition(transition.id));
            }
            validate_transition(&transition, &zone_map)?;

            for zone in &transition.zones {
                if let Some(set) = connections.get_mut(zone) {
                    set.insert(transition.id.clone());
                }
            }
            transition_map.insert(transition.id.clone(), transition);
        }

        Ok(Self {
            zones: zone_map,
            transitions: transition_map,
            connections,
        })
    }

    /// Look up a zone definition.
    pub fn zone(&self, id: &ZoneId) -> Option<&ZoneDefinition> {
        self.zones.get(id)
    }

    /// Look up a transition definition.
    pub fn transition(&self, id: &TransitionId) -> Option<&TransitionDefinition> {
        self.transitions.get(id)
    }

    /// Number of registered zones.
    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    /// All zone definitions, sorted by id.
    pub fn zones(&self) -> Vec<&ZoneDefinition> {
        let mut zones: Vec<_> = self.zones.values().collect();
        zones.sort_by(|a, b| a.id.cmp(&b.id));
        zones
    }

    /// All transition definitions, sorted by id.
    pub fn transitions(&self) -> Vec<&TransitionDefinition> {
        let mut transitions: Vec<_> = self.transitions.values().collect();
        transitions.sort_by(|a, b| a.id.cmp(&b.id));
        transitions
    }

    /// Transition ids touching `zone`.
    pub fn connections(&self, zone: &ZoneId) -> BTreeSet<TransitionId> {
        self.connections.get(zone).cloned().unwrap_or_default()
    }

    /// Zones reachable through exactly one transition.
    pub fn adjacent_zones(&self, zone: &ZoneId) -> BTreeSet<ZoneId> {
        let Some(ids) = self.connections.get(zone) else {
            return BTreeSet::new();
        };

        ids.iter()
            .filter_map(|id| self.transitions.get(id))
            .flat_map(|t| t.other_zones(zone).cloned())
            .collect()
    }

    /// Breadth-first closure of zones within `max_depth` transitions.
    ///
    /// The start zone is included at depth 0. Unknown zones yield an empty set.
    pub fn connected_zones(&self, zone: &ZoneId, max_depth: usize) -> BTreeSet<ZoneId> {
        let mut visited = BTreeSet::new();
        if !self.zones.contains_key(zone) {
            return visited;
        }

        let mut queue = VecDeque::new();
        visited.insert(zone.clone());
        queue.push_back((zone.clone(), 0usize));

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for next in self.adjacent_zones(&current) {
                if visited.insert(next.clone()) {
                    queue.push_back((next, depth + 1));
                }
            }
        }

        visited
    }

    /// The transition linking `a` and `b`, lowest id first when several do.
    pub fn transition_between(&self, a: &ZoneId, b: &ZoneId) -> Option<&TransitionDefinition> {
        self.connections
            .get(a)?
            .iter()
            .filter_map(|id| self.transitions.get(id))
            .find(|t| t.links(a, b))
    }
}

fn validate_transition(
    transition: &TransitionDefinition,
    zones: &HashMap<ZoneId, ZoneDefinition>,
) -> Result<(), RegistryError> {
    let invalid = |reason: &str| RegistryError::InvalidTransition {
        transition: transition.id.clone(),
        reason: reason.to_string(),
    };

    for zone in &transition.zones {
        if !zones.contains_key(zone) {
            return Err(RegistryError::UnknownZone {
                transition: transition.id.clone(),
                zone: zone.clone(),
            });
        }
    }

    let distinct: BTreeSet<_> = transition.zones.iter().collect();
    if distinct.len() != transition.zones.len() {
        return Err(invalid("zone listed more than once"));
    }

    match transition.kind {
        TransitionKind::Corridor(p) => {
            if transition.zones.len() != 2 {
                return Err(invalid("corridor must join exactly two zones"));
            }
            if !(p.length > 0.0) || p.proximity < 0.0 {
                return Err(invalid("corridor length must be positive"));
            }
        }
        TransitionKind::Vent(p) => {
            if transition.zones.len() != 2 {
                return Err(invalid("vent must join exactly two zones"));
            }
            if !(p.length > 0.0) || !(p.width > 0.0) {
                return Err(invalid("vent length and width must be positive"));
            }
        }
        TransitionKind::Elevator(p) => {
            if transition.zones.len() < 2 {
                return Err(invalid("elevator must serve at least two zones"));
            }
            if !(0.0..=MAX_ELEVATOR_TRAVEL_SECS).contains(&p.travel_secs) {
                return Err(invalid("elevator travel time must be between 0 and 600 seconds"));
            }
        }
    }

    if transition.locked && transition.required_item.is_none() {
        return Err(invalid("locked transition needs a required item"));
    }

    Ok(())
}
