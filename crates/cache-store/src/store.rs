//! Durable key-to-blob mapping with atomic create-if-absent
//!
//! One file per cache key, named `<key>.cache`, under a single root
//! directory. The directory listing is the index; there is no manifest.
//! Uploads are staged in a temp file and published with a hard link, so a
//! key either does not exist or names a complete payload.

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info};

/// File suffix for published entries
pub(crate) const ENTRY_SUFFIX: &str = ".cache";
/// File suffix for in-flight upload staging files
pub(crate) const TMP_SUFFIX: &str = ".tmp";
/// Maximum accepted key length
pub const MAX_KEY_LEN: usize = 128;

/// Sequence counter for unique staging-file names
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Statistics about the store, from a directory scan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub entries: usize,
    pub total_bytes: u64,
}

/// File-backed blob store
///
/// Entries are write-once: a second `create` for an existing key fails with
/// [`StoreError::AlreadyExists`] and never overwrites. All mutual exclusion
/// is delegated to the filesystem's link semantics; the store holds no
/// in-process locks.
#[derive(Debug, Clone)]
pub struct EntryStore {
    root: PathBuf,
}

impl EntryStore {
    /// Create a store rooted at `root`. Call [`EntryStore::init`] before use.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    /// Ensure the root directory exists
    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        info!(root = ?self.root, "Entry store initialized");
        Ok(())
    }

    /// Reject keys that are empty, too long, or contain anything outside
    /// `[A-Za-z0-9_-]`. This keeps every key safe to embed in a path: no
    /// separators, no `..`, no hidden-file prefixes.
    pub fn validate_key(key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey("key is empty".to_string()));
        }
        if key.len() > MAX_KEY_LEN {
            return Err(StoreError::InvalidKey(format!(
                "key exceeds {} characters",
                MAX_KEY_LEN
            )));
        }
        if !key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            return Err(StoreError::InvalidKey(
                "key may only contain [A-Za-z0-9_-]".to_string(),
            ));
        }
        Ok(())
    }

    /// Path of the published entry for `key`
    fn entry_path(&self, key: &str) -> Result<PathBuf> {
        Self::validate_key(key)?;
        Ok(self.root.join(format!("{}{}", key, ENTRY_SUFFIX)))
    }

    /// Unique staging path for an in-flight upload of `key`
    fn staging_path(&self, key: &str) -> PathBuf {
        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        self.root.join(format!(
            "{}.{}-{}{}",
            key,
            std::process::id(),
            seq,
            TMP_SUFFIX
        ))
    }

    /// Store exactly `declared_len` bytes from `payload` under `key`.
    ///
    /// Create-if-absent: when several callers race on the same key, exactly
    /// one wins and the rest observe [`StoreError::AlreadyExists`]. The
    /// payload is staged in a temp file and published atomically with a
    /// hard link, so readers never see a partially written entry. If the
    /// payload ends before `declared_len` bytes, the staging file is
    /// removed and the call fails with [`StoreError::Truncated`]; bytes
    /// beyond `declared_len` are not consumed.
    pub async fn create<R>(&self, key: &str, declared_len: u64, payload: R) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let entry = self.entry_path(key)?;

        // Fast path: refuse before staging the payload. The hard link below
        // is what actually arbitrates concurrent creators.
        if self.exists(key).await? {
            return Err(StoreError::AlreadyExists);
        }

        let staging = self.staging_path(key);
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&staging)
            .await?;

        let mut limited = payload.take(declared_len);
        let copied = match tokio::io::copy(&mut limited, &mut file).await {
            Ok(n) => n,
            Err(e) => {
                drop(file);
                let _ = fs::remove_file(&staging).await;
                return Err(StoreError::Io(e));
            }
        };
        drop(file);

        if copied != declared_len {
            let _ = fs::remove_file(&staging).await;
            return Err(StoreError::Truncated {
                expected: declared_len,
                actual: copied,
            });
        }

        let published = match fs::hard_link(&staging, &entry).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(StoreError::AlreadyExists)
            }
            Err(e) => Err(StoreError::Io(e)),
        };
        let _ = fs::remove_file(&staging).await;

        if published.is_ok() {
            debug!(key = %key, bytes = declared_len, "Stored cache entry");
        }
        published
    }

    /// Metadata-only existence probe. Never reads payload bytes and never
    /// refreshes the entry's access time, so polling cannot keep an entry
    /// alive past the eviction threshold.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let entry = self.entry_path(key)?;
        match fs::metadata(&entry).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// Read the full payload for `key`, returning its exact length and
    /// bytes. Reading advances the medium's access time where the medium
    /// tracks it, which is what keeps a hot entry from being evicted.
    pub async fn read(&self, key: &str) -> Result<(u64, Vec<u8>)> {
        let entry = self.entry_path(key)?;
        match fs::read(&entry).await {
            Ok(data) => Ok((data.len() as u64, data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// Remove the entry for `key`. Returns `false` when the entry was
    /// already gone; callers racing the sweeper treat that as benign.
    pub async fn remove(&self, key: &str) -> Result<bool> {
        let entry = self.entry_path(key)?;
        match fs::remove_file(&entry).await {
            Ok(()) => {
                debug!(key = %key, "Removed cache entry");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// Count entries and total payload bytes by scanning the root directory
    pub async fn stats(&self) -> Result<StoreStats> {
        let mut stats = StoreStats::default();
        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(item) = dir.next_entry().await? {
            let name = item.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.ends_with(ENTRY_SUFFIX) {
                continue;
            }
            // Entries can vanish between listing and stat
            if let Ok(meta) = item.metadata().await {
                if meta.is_file() {
                    stats.entries += 1;
                    stats.total_bytes += meta.len();
                }
            }
        }
        Ok(stats)
    }
}
