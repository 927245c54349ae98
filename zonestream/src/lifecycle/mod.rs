//! Zone lifecycle management.
//!
//! Every zone moves through the state machine in [`ZoneState`]. Requests go
//! through [`ZoneLifecycle`], which coalesces duplicate requests onto one
//! shared [`LoadTicket`], keeps the [`MemoryBudget`](crate::budget::MemoryBudget)
//! in step with zone states, evicts least-recently-visited zones when a load
//! would not fit, and saves/restores zone snapshots around unloads and visits.
//!
//! # Example
//!
//! ```ignore
//! let ticket = lifecycle.request_load(&"lab".into(), DetailLevel::Full)?;
//! let level = ticket.await?;
//! lifecycle.set_active(&"lab".into())?;
//! ```

mod controller;
mod state;
mod ticket;

pub use controller::{LifecycleStats, ZoneLifecycle, ZoneStatus};
pub use state::{DetailLevel, ZoneState};
pub use ticket::{LoadOutcome, LoadTicket};
