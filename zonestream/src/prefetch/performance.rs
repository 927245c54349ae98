//! Host performance signal.
//!
//! Prefetching is speculative work; when the host reports reduced
//! performance the prefetcher skips its cycle entirely. The prefetcher only
//! asks "is performance reduced?", never why.

use std::fmt;

/// Coarse performance class reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PerformanceClass {
    /// Frame budget is healthy.
    #[default]
    Normal,
    /// Host is struggling; speculative work should pause.
    Reduced,
}

impl PerformanceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            PerformanceClass::Normal => "normal",
            PerformanceClass::Reduced => "reduced",
        }
    }

    /// Whether speculative work should pause.
    pub fn is_reduced(&self) -> bool {
        matches!(self, PerformanceClass::Reduced)
    }
}

impl fmt::Display for PerformanceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reports the host's current performance class.
///
/// # Implementors
///
/// - `SteadyPerformance` - always normal
/// - `ReducedPerformance` - always reduced
pub trait PerformanceSignal: Send + Sync {
    /// Queried once per tick.
    fn class(&self) -> PerformanceClass;
}

/// Signal that always reports normal performance.
#[derive(Debug, Default, Clone, Copy)]
pub struct SteadyPerformance;

impl PerformanceSignal for SteadyPerformance {
    fn class(&self) -> PerformanceClass {
        PerformanceClass::Normal
    }
}

/// Signal that always reports reduced performance.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReducedPerformance;

impl PerformanceSignal for ReducedPerformance {
    fn class(&self) -> PerformanceClass {
        PerformanceClass::Reduced
    }
}
