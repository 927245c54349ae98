//! ZoneStream - zone streaming and transition management
//!
//! Streams a world split into discrete zones under a fixed memory budget.
//! Zones load at graded detail, the least recently visited ones are evicted
//! when room runs out, likely next zones are prefetched from the player's
//! movement, and the player crosses between zones through interactive
//! transitions (corridors, elevators, vents) that hide loading instead of
//! showing a loading screen.
//!
//! # Architecture
//!
//! ```text
//!                         ┌──────────────┐
//!            host ───────►│ ZoneManager  │◄─────── tick(dt, position)
//!                         └──────┬───────┘
//!            ┌───────────────────┼────────────────────┐
//!            ▼                   ▼                    ▼
//!   ┌────────────────┐  ┌────────────────┐  ┌──────────────────────┐
//!   │ ZonePrefetcher │  │ ZoneLifecycle  │◄─│TransitionOrchestrator│
//!   └───────┬────────┘  └───┬────────┬───┘  └──────────┬───────────┘
//!           └──────────────►│        │                 ▼
//!                   MemoryBudget  ZonePersistence  TransitionSequence
//! ```
//!
//! Everything the engine provides (content loading, entity spawning,
//! storage, input, inventory, presentation) sits behind the traits in
//! [`host`]. [`host::simulated`] has in-process implementations for tests
//! and the CLI.

pub mod budget;
pub mod config;
pub mod coord;
pub mod debug;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod manager;
pub mod persistence;
pub mod prefetch;
pub mod registry;
pub mod transition;

pub use budget::{MemoryBudget, OverrunPolicy};
pub use config::{ConfigError, StreamingConfig};
pub use debug::DebugSnapshot;
pub use error::{ZoneError, ZoneResult};
pub use lifecycle::{DetailLevel, ZoneState};
pub use manager::{TickReport, TransitionStart, ZoneManager, ZoneManagerBuilder};
pub use registry::{WorldDefinition, ZoneId, ZoneRegistry};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
