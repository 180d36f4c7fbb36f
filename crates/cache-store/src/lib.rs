//! File-backed blob store with idle-based eviction
//!
//! Stores opaque byte payloads on disk, one file per cache key, with
//! atomic create-if-absent semantics. A background sweeper removes
//! entries that have not been read for longer than a configured
//! threshold, using the storage medium's access-time metadata.

mod access;
mod error;
mod store;
mod sweep;

pub use access::{AccessMeta, FsAccessMeta};
pub use error::{Result, StoreError};
pub use store::{EntryStore, StoreStats};
pub use sweep::{SweepStats, Sweeper};
