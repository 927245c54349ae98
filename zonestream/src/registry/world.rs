//! World definition files.
//!
//! A world is authored as JSON listing its zones and transitions:
//!
//! ```json
//! {
//!   "zones": [{ "id": "atrium", "size": "large" }, { "id": "lab", "size": "medium" }],
//!   "transitions": [
//!     { "id": "hall", "kind": "corridor", "length": 12.0, "zones": ["atrium", "lab"] }
//!   ]
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::transition::TransitionDefinition;
use super::zone::ZoneDefinition;
use super::{RegistryError, ZoneRegistry};

/// Serialized form of a world's static layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldDefinition {
    pub zones: Vec<ZoneDefinition>,

    #[serde(default)]
    pub transitions: Vec<TransitionDefinition>,
}

impl WorldDefinition {
    /// Parse a world from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, RegistryError> {
        serde_json::from_str(json).map_err(|e| RegistryError::Parse(e.to_string()))
    }

    /// Read and parse a world file.
    pub fn from_path(path: &Path) -> Result<Self, RegistryError> {
        let text = fs::read_to_string(path).map_err(|e| RegistryError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_json_str(&text)
    }

    /// Validate and build the lookup tables.
    pub fn into_registry(self) -> Result<ZoneRegistry, RegistryError> {
        ZoneRegistry::new(self.zones, self.transitions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ZoneId;

    const WORLD: &str = r#"{
        "zones": [
            { "id": "atrium", "size": "large" },
            { "id": "lab", "size": "medium" }
        ],
        "transitions": [
            { "id": "hall", "kind": "corridor", "length": 12.0, "zones": ["atrium", "lab"] }
        ]
    }"#;

    #[test]
    fn test_parse_and_build() {
        let registry = WorldDefinition::from_json_str(WORLD)
            .unwrap()
            .into_registry()
            .unwrap();

        assert_eq!(registry.zone_count(), 2);
        assert!(registry
            .adjacent_zones(&ZoneId::from("atrium"))
            .contains(&ZoneId::from("lab")));
    }

    #[test]
    fn test_parse_error() {
        let err = WorldDefinition::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, RegistryError::Parse(_)));
    }

    #[test]
    fn test_read_missing_file() {
        let err = WorldDefinition::from_path(Path::new("/nonexistent/world.json")).unwrap_err();
        assert!(matches!(err, RegistryError::Read { .. }));
    }
}
