//! Host collaborator interfaces and in-process implementations.
//!
//! [`traits`] defines what the streaming core consumes. [`MemoryStore`] and
//! the [`simulated`] collaborators implement those traits without a game
//! engine; the CLI and the test suites run the manager against them.

mod memory;
pub mod simulated;
mod traits;

pub use memory::MemoryStore;
pub use traits::{
    BoxFuture, EntitySpawner, FrameInput, InputSource, Inventory, KeyValueStore,
    LoadedZoneHandle, LoaderError, StoreError, TransitionPresenter, ZoneLoader,
};
