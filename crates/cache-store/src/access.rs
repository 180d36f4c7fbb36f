//! Access-time metadata capability
//!
//! Eviction decisions are based on when an entry was last read. Where that
//! timestamp comes from is a property of the storage medium, so the sweeper
//! consults this trait instead of statting files directly. Backends that do
//! not track access time return `None` and the sweeper leaves the entry
//! alone.

use chrono::{DateTime, Utc};
use std::path::Path;

/// Source of last-access timestamps for stored entries
pub trait AccessMeta: Send + Sync {
    /// Last-access timestamp for the file at `path`, or `None` when the
    /// medium does not track access time (or the file is gone).
    fn last_access(&self, path: &Path) -> Option<DateTime<Utc>>;
}

/// Filesystem-backed implementation using the OS access-time field.
///
/// Note that some mounts (`noatime`) disable access-time tracking; on those
/// `accessed()` still returns a value but it never advances, so entries are
/// evicted based on creation time instead. Mounts with `relatime` update
/// the field often enough for eviction purposes.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsAccessMeta;

impl AccessMeta for FsAccessMeta {
    fn last_access(&self, path: &Path) -> Option<DateTime<Utc>> {
        std::fs::metadata(path)
            .and_then(|meta| meta.accessed())
            .ok()
            .map(DateTime::<Utc>::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_last_access_for_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("entry.cache");
        std::fs::write(&path, b"payload").unwrap();

        let atime = FsAccessMeta.last_access(&path);
        assert!(atime.is_some());

        // A freshly created file was accessed "just now"
        let age = Utc::now() - atime.unwrap();
        assert!(age.num_seconds() >= -1 && age.num_seconds() < 60);
    }

    #[test]
    fn test_last_access_for_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.cache");
        assert!(FsAccessMeta.last_access(&path).is_none());
    }
}
