//! Concurrent in-memory cache with byte accounting and expiry.

mod entry;
mod snapshot;
mod store;

pub use entry::{CacheEntry, SnapshotState};
pub use snapshot::{run_snapshot_task, SnapshotError, SnapshotManager};
pub use store::{CacheError, CacheStore};
