//! Per-zone lifecycle states and detail levels.
//!
//! # State Machine
//!
//! ```text
//!              request                 resolve(level)
//!   Unloaded ----------> Loading ---------------------> Proxy | Simplified | Full
//!      ^                    |  loader failure                    |      |
//!      |                    +--> (previous state)                |      | higher level
//!      |                                                         |      v
//!      +------------ Unloading <---------- evict / unload -------+   Loading
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// How much of a zone's content is resident.
///
/// Ordered: `Proxy < Simplified < Full`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailLevel {
    /// Collision only.
    Proxy,
    /// Basic visible shape.
    Simplified,
    /// Complete content.
    Full,
}

impl DetailLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetailLevel::Proxy => "proxy",
            DetailLevel::Simplified => "simplified",
            DetailLevel::Full => "full",
        }
    }
}

impl fmt::Display for DetailLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneState {
    Unloaded,
    Loading,
    Proxy,
    Simplified,
    Full,
    Unloading,
}

impl ZoneState {
    /// Resident detail level, if the zone is settled at one.
    pub fn detail_level(&self) -> Option<DetailLevel> {
        match self {
            ZoneState::Proxy => Some(DetailLevel::Proxy),
            ZoneState::Simplified => Some(DetailLevel::Simplified),
            ZoneState::Full => Some(DetailLevel::Full),
            _ => None,
        }
    }

    /// Settled at some detail level (eligible for eviction).
    pub fn is_resident(&self) -> bool {
        self.detail_level().is_some()
    }

    /// Counts against the memory budget.
    pub fn holds_memory(&self) -> bool {
        !matches!(self, ZoneState::Unloaded)
    }

    /// A load or unload is in progress.
    pub fn is_transient(&self) -> bool {
        matches!(self, ZoneState::Loading | ZoneState::Unloading)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneState::Unloaded => "unloaded",
            ZoneState::Loading => "loading",
            ZoneState::Proxy => "proxy",
            ZoneState::Simplified => "simplified",
            ZoneState::Full => "full",
            ZoneState::Unloading => "unloading",
        }
    }
}

impl From<DetailLevel> for ZoneState {
    fn from(level: DetailLevel) -> Self {
        match level {
            DetailLevel::Proxy => ZoneState::Proxy,
            DetailLevel::Simplified => ZoneState::Simplified,
            DetailLevel::Full => ZoneState::Full,
        }
    }
}

impl fmt::Display for ZoneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
