//! Zone identifiers, declared size categories and static zone definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::coord::Vec2;

/// Bytes in one mebibyte, the unit size categories are declared in.
pub const MB: u64 = 1024 * 1024;

/// Stable identifier of a zone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(String);

impl ZoneId {
    /// Create a zone id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ZoneId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ZoneId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Declared memory footprint class of a zone.
///
/// The streaming budget works on these estimates rather than on measured
/// allocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeCategory {
    Tiny,
    Small,
    Medium,
    Large,
    Huge,
}

impl SizeCategory {
    /// Estimated resident size in bytes.
    pub fn bytes(&self) -> u64 {
        match self {
            SizeCategory::Tiny => 2 * MB,
            SizeCategory::Small => 10 * MB,
            SizeCategory::Medium => 25 * MB,
            SizeCategory::Large => 40 * MB,
            SizeCategory::Huge => 60 * MB,
        }
    }

    /// Short lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SizeCategory::Tiny => "tiny",
            SizeCategory::Small => "small",
            SizeCategory::Medium => "medium",
            SizeCategory::Large => "large",
            SizeCategory::Huge => "huge",
        }
    }
}

impl fmt::Display for SizeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static definition of one loadable world partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneDefinition {
    /// Unique zone id.
    pub id: ZoneId,

    /// Declared size category.
    pub size: SizeCategory,

    /// Optional world-space anchor, used to match predicted movement
    /// direction against the zone's relative location.
    #[serde(default)]
    pub anchor: Option<Vec2>,

    /// Human-readable name for tooling.
    #[serde(default)]
    pub name: Option<String>,
}

impl ZoneDefinition {
    /// Create a zone definition without anchor or display name.
    pub fn new(id: impl Into<ZoneId>, size: SizeCategory) -> Self {
        Self {
            id: id.into(),
            size,
            anchor: None,
            name: None,
        }
    }

    /// Set the world-space anchor.
    pub fn with_anchor(mut self, anchor: Vec2) -> Self {
        self.anchor = Some(anchor);
        self
    }

    /// Estimated resident size in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.size.bytes()
    }

    /// Display name, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }
}
