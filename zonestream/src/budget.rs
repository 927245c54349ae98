//! Memory budget tracking.
//!
//! The budget counts declared size-category bytes of every zone that is not
//! `Unloaded`. It is owned by the lifecycle controller, which is the only
//! place that commits or releases bytes.
//!
//! Eviction order is least-recently-visited first: zones that were never the
//! active zone sort before all visited ones, and ties are broken by zone id so
//! the order is deterministic.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::registry::ZoneId;

/// What to do when eviction cannot free enough memory for a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrunPolicy {
    /// Proceed over budget and flag the overrun.
    #[default]
    Allow,
    /// Refuse the load with `ZoneError::BudgetExceeded`.
    Reject,
}

impl OverrunPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverrunPolicy::Allow => "allow",
            OverrunPolicy::Reject => "reject",
        }
    }
}

impl fmt::Display for OverrunPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverrunPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "allow" => Ok(OverrunPolicy::Allow),
            "reject" => Ok(OverrunPolicy::Reject),
            other => Err(format!("unknown overrun policy '{}'", other)),
        }
    }
}

/// A resident zone that may be unloaded to make room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictionCandidate {
    pub zone: ZoneId,
    /// Game time the zone was last active, `None` if never.
    pub last_visited_at: Option<Duration>,
}

/// Result of making room for a load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionReport {
    /// Zones unloaded, in eviction order.
    pub evicted: Vec<ZoneId>,
    /// Bytes released by those unloads.
    pub freed_bytes: u64,
    /// Bytes the request still exceeds the limit by, when nothing else could be freed.
    pub overrun_bytes: u64,
}

impl EvictionReport {
    /// Whether the load proceeds over budget.
    pub fn is_overrun(&self) -> bool {
        self.overrun_bytes > 0
    }
}

/// Committed memory against a fixed limit.
#[derive(Debug, Clone)]
pub struct MemoryBudget {
    limit_bytes: u64,
    committed_bytes: u64,
    policy: OverrunPolicy,
    overrun_events: u64,
}

impl MemoryBudget {
    /// Create an empty budget.
    pub fn new(limit_bytes: u64, policy: OverrunPolicy) -> Self {
        Self {
            limit_bytes,
            committed_bytes: 0,
            policy,
            overrun_events: 0,
        }
    }

    /// Whether `bytes` more fit under the limit.
    pub fn can_afford(&self, bytes: u64) -> bool {
        self.committed_bytes.saturating_add(bytes) <= self.limit_bytes
    }

    /// Bytes left before the limit.
    pub fn available(&self) -> u64 {
        self.limit_bytes.saturating_sub(self.committed_bytes)
    }

    pub fn limit_bytes(&self) -> u64 {
        self.limit_bytes
    }

    pub fn committed_bytes(&self) -> u64 {
        self.committed_bytes
    }

    pub fn policy(&self) -> OverrunPolicy {
        self.policy
    }

    /// Number of loads that proceeded over budget.
    pub fn overrun_events(&self) -> u64 {
        self.overrun_events
    }

    /// Committed memory currently exceeds the limit.
    pub fn is_over_limit(&self) -> bool {
        self.committed_bytes > self.limit_bytes
    }

    /// Fraction of the limit in use.
    pub fn utilization(&self) -> f64 {
        if self.limit_bytes == 0 {
            return if self.committed_bytes == 0 { 0.0 } else { f64::INFINITY };
        }
        self.committed_bytes as f64 / self.limit_bytes as f64
    }

    /// Change the limit. Takes effect on the next affordability check.
    pub fn set_limit(&mut self, limit_bytes: u64) {
        self.limit_bytes = limit_bytes;
    }

    pub(crate) fn commit(&mut self, bytes: u64) {
        self.committed_bytes = self.committed_bytes.saturating_add(bytes);
    }

    pub(crate) fn release(&mut self, bytes: u64) {
        if bytes > self.committed_bytes {
            warn!(
                bytes,
                committed = self.committed_bytes,
                "Releasing more memory than committed"
            );
        }
        self.committed_bytes = self.committed_bytes.saturating_sub(bytes);
    }

    /// Record that a request of `bytes` proceeds over budget.
    ///
    /// Returns the number of bytes the budget will exceed its limit by.
    pub(crate) fn record_overrun(&mut self, bytes: u64) -> u64 {
        self.overrun_events += 1;
        self.committed_bytes
            .saturating_add(bytes)
            .saturating_sub(self.limit_bytes)
    }

    /// Order candidates for eviction: never-visited first, then oldest visit.
    pub fn eviction_order(mut candidates: Vec<EvictionCandidate>) -> Vec<ZoneId> {
        candidates.sort_by(|a, b| {
            a.last_visited_at
                .cmp(&b.last_visited_at)
                .then_with(|| a.zone.cmp(&b.zone))
        });
        candidates.into_iter().map(|c| c.zone).collect()
    }
}
