//! Point-in-time diagnostics.
//!
//! [`DebugSnapshot`] is what a debug overlay or the CLI prints: which zone is
//! active, how much memory is committed, what the prefetcher thinks, every
//! zone's state and the in-flight hand-off.

use serde::Serialize;

use crate::lifecycle::{LifecycleStats, ZoneStatus};
use crate::prefetch::{PrefetchScore, PrefetchStatus};
use crate::registry::ZoneId;
use crate::transition::{HandoffStats, TransitionView};

/// Snapshot of the manager's state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugSnapshot {
    /// Frames ticked so far.
    pub frame: u64,
    pub active_zone: Option<ZoneId>,
    pub committed_bytes: u64,
    pub limit_bytes: u64,
    pub over_budget: bool,
    pub prefetch_status: PrefetchStatus,
    /// Last prefetch scores, highest first.
    pub prefetch_priorities: Vec<PrefetchScore>,
    /// Every zone, sorted by id.
    pub zones: Vec<ZoneStatus>,
    pub active_transition: Option<TransitionView>,
    pub lifecycle: LifecycleStats,
    pub handoffs: HandoffStats,
    pub background_loads: usize,
}

impl DebugSnapshot {
    /// Memory usage as `"used / limit (pct%)"`.
    pub fn memory_usage_human(&self) -> String {
        let pct = if self.limit_bytes == 0 {
            0.0
        } else {
            self.committed_bytes as f64 / self.limit_bytes as f64 * 100.0
        };
        format!(
            "{} / {} ({:.0}%)",
            format_size(self.committed_bytes),
            format_size(self.limit_bytes),
            pct
        )
    }

    /// Zones currently holding memory.
    pub fn resident_zones(&self) -> Vec<&ZoneStatus> {
        self.zones.iter().filter(|z| z.state.holds_memory()).collect()
    }

    /// Pretty JSON for logging or dumping to a file.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Format a size in bytes as a human-readable string.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
