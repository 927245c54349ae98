//! Streaming configuration.
//!
//! All tunables of the manager in one place, with INI file support:
//!
//! ```ini
//! [budget]
//! limit_mb = 512
//! overrun_policy = allow
//!
//! [prefetch]
//! history_capacity = 10
//! recent_visit_secs = 60
//! score_threshold = 60
//! max_requests_per_tick = 2
//! scan_depth = 1
//! heading_bonus = 0
//!
//! [persistence]
//! ttl_hours = 24
//!
//! [handoff]
//! keep_depth = 2
//! ```
//!
//! Missing keys keep their defaults; unknown keys are ignored.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};
use thiserror::Error;
use tracing::debug;

use crate::budget::OverrunPolicy;
use crate::persistence::DEFAULT_SNAPSHOT_TTL;
use crate::prefetch::PrefetchConfig;
use crate::registry::MB;
use crate::transition::DEFAULT_KEEP_DEPTH;

/// Default memory budget in megabytes.
pub const DEFAULT_BUDGET_LIMIT_MB: u64 = 512;

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid value '{value}' for [{section}] {key}: {reason}")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("zone manager requires a {0}")]
    MissingCollaborator(&'static str),
}

/// Configuration for a [`ZoneManager`](crate::ZoneManager).
#[derive(Debug, Clone, PartialEq)]
pub struct StreamingConfig {
    /// Memory budget in bytes.
    pub budget_limit_bytes: u64,
    /// What to do when eviction cannot make room.
    pub overrun_policy: OverrunPolicy,
    /// Prefetch tuning.
    pub prefetch: PrefetchConfig,
    /// Snapshots older than this are discarded.
    pub snapshot_ttl: Duration,
    /// Zones within this many transitions of the destination survive a hand-off.
    pub keep_depth: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            budget_limit_bytes: DEFAULT_BUDGET_LIMIT_MB * MB,
            overrun_policy: OverrunPolicy::default(),
            prefetch: PrefetchConfig::default(),
            snapshot_ttl: DEFAULT_SNAPSHOT_TTL,
            keep_depth: DEFAULT_KEEP_DEPTH,
        }
    }
}

impl StreamingConfig {
    pub fn with_budget_limit_bytes(mut self, bytes: u64) -> Self {
        self.budget_limit_bytes = bytes;
        self
    }

    pub fn with_budget_limit_mb(self, mb: u64) -> Self {
        self.with_budget_limit_bytes(mb * MB)
    }

    pub fn with_overrun_policy(mut self, policy: OverrunPolicy) -> Self {
        self.overrun_policy = policy;
        self
    }

    pub fn with_prefetch(mut self, prefetch: PrefetchConfig) -> Self {
        self.prefetch = prefetch;
        self
    }

    pub fn with_snapshot_ttl(mut self, ttl: Duration) -> Self {
        self.snapshot_ttl = ttl;
        self
    }

    pub fn with_keep_depth(mut self, depth: usize) -> Self {
        self.keep_depth = depth;
        self
    }

    /// Load from an INI file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        debug!(path = %path.display(), "Loaded streaming config");
        Self::from_ini(&ini)
    }

    /// Parse INI text.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("budget")) {
            if let Some(mb) = parse_key::<u64>(section, "budget", "limit_mb")? {
                config.budget_limit_bytes = mb * MB;
            }
            if let Some(policy) = parse_key::<OverrunPolicy>(section, "budget", "overrun_policy")? {
                config.overrun_policy = policy;
            }
        }

        if let Some(section) = ini.section(Some("prefetch")) {
            let prefetch = &mut config.prefetch;
            if let Some(v) = parse_key(section, "prefetch", "history_capacity")? {
                prefetch.history_capacity = v;
            }
            if let Some(secs) = parse_key::<u64>(section, "prefetch", "recent_visit_secs")? {
                prefetch.recent_visit_window = Duration::from_secs(secs);
            }
            if let Some(v) = parse_key(section, "prefetch", "score_threshold")? {
                prefetch.score_threshold = v;
            }
            if let Some(v) = parse_key(section, "prefetch", "max_requests_per_tick")? {
                prefetch.max_requests_per_tick = v;
            }
            if let Some(v) = parse_key(section, "prefetch", "scan_depth")? {
                prefetch.scan_depth = v;
            }
            if let Some(v) = parse_key(section, "prefetch", "heading_bonus")? {
                prefetch.heading_bonus = v;
            }
        }

        if let Some(section) = ini.section(Some("persistence")) {
            if let Some(hours) = parse_key::<u64>(section, "persistence", "ttl_hours")? {
                config.snapshot_ttl = Duration::from_secs(hours * 3600);
            }
        }

        if let Some(section) = ini.section(Some("handoff")) {
            if let Some(depth) = parse_key(section, "handoff", "keep_depth")? {
                config.keep_depth = depth;
            }
        }

        Ok(config)
    }

    /// Render as INI text.
    pub fn to_ini_string(&self) -> String {
        let mut ini = Ini::new();
        ini.with_section(Some("budget"))
            .set("limit_mb", (self.budget_limit_bytes / MB).to_string())
            .set("overrun_policy", self.overrun_policy.as_str());
        ini.with_section(Some("prefetch"))
            .set("history_capacity", self.prefetch.history_capacity.to_string())
            .set(
                "recent_visit_secs",
                self.prefetch.recent_visit_window.as_secs().to_string(),
            )
            .set("score_threshold", self.prefetch.score_threshold.to_string())
            .set(
                "max_requests_per_tick",
                self.prefetch.max_requests_per_tick.to_string(),
            )
            .set("scan_depth", self.prefetch.scan_depth.to_string())
            .set("heading_bonus", self.prefetch.heading_bonus.to_string());
        ini.with_section(Some("persistence"))
            .set("ttl_hours", (self.snapshot_ttl.as_secs() / 3600).to_string());
        ini.with_section(Some("handoff"))
            .set("keep_depth", self.keep_depth.to_string());

        let mut out = Vec::new();
        // Writing into a Vec cannot fail
        let _ = ini.write_to(&mut out);
        String::from_utf8_lossy(&out).into_owned()
    }
}

fn parse_key<T>(
    section: &Properties,
    section_name: &'static str,
    key: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match section.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                section: section_name,
                key,
                value: raw.to_string(),
                reason: e.to_string(),
            }),
    }
}
