//! Optional remote synchronization for the Shelf catalog core.
//!
//! The remote peer is an interface, not an implementation: a
//! [`SyncBridge`] can push the serialized state of both record collections
//! and deliver remote snapshots back. Applying a remote snapshot is a
//! wholesale last-write-wins overwrite of both collections — there is no
//! merge, by design.

pub mod bridge;
pub mod engine;
pub mod error;
pub mod snapshot;

pub use bridge::{MemoryBridge, SyncBridge};
pub use engine::{SyncEngine, SyncStatus};
pub use error::{SyncError, SyncResult};
pub use snapshot::Snapshot;
