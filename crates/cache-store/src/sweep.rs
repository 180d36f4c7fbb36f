//! Background eviction sweeper
//!
//! Periodically walks the store and removes entries that have been idle
//! longer than the configured threshold. The sweep is a best-effort pass
//! running concurrently with live create/read traffic: entries appearing or
//! vanishing mid-scan are fine, and every per-entry failure is
//! skip-and-continue. The loop itself never exits.

use crate::access::AccessMeta;
use crate::store::{EntryStore, ENTRY_SUFFIX, TMP_SUFFIX};
use chrono::{TimeDelta, Utc};
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, info, warn};

/// Outcome of a single sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Entries examined
    pub scanned: usize,
    /// Entries removed for exceeding the idle threshold
    pub evicted: usize,
    /// Entries skipped because no access time was available
    pub skipped: usize,
    /// Per-entry failures (stat or removal errors)
    pub errors: usize,
}

/// Removes entries idle past `max_idle`, using `A` for access timestamps
pub struct Sweeper<A: AccessMeta> {
    store: EntryStore,
    access: A,
    max_idle: TimeDelta,
}

impl<A: AccessMeta> Sweeper<A> {
    pub fn new(store: EntryStore, access: A, max_idle: Duration) -> Self {
        let max_idle = TimeDelta::from_std(max_idle).unwrap_or(TimeDelta::MAX);
        Self {
            store,
            access,
            max_idle,
        }
    }

    /// Run sweep passes forever, one per `period` tick. The first tick
    /// fires immediately, so a cold store is swept at startup.
    pub async fn run(self, period: Duration) {
        let mut ticker = interval(period);
        loop {
            ticker.tick().await;
            let stats = self.sweep().await;
            if stats.evicted > 0 || stats.errors > 0 {
                info!(
                    scanned = stats.scanned,
                    evicted = stats.evicted,
                    skipped = stats.skipped,
                    errors = stats.errors,
                    "Sweep pass finished"
                );
            } else {
                debug!(scanned = stats.scanned, "Sweep pass finished, nothing to evict");
            }
        }
    }

    /// One pass over the store. Never returns an error: failures are
    /// counted, logged, and skipped so a bad entry cannot stall eviction.
    pub async fn sweep(&self) -> SweepStats {
        let mut stats = SweepStats::default();

        let mut dir = match tokio::fs::read_dir(self.store.root()).await {
            Ok(dir) => dir,
            Err(e) => {
                warn!(root = ?self.store.root(), error = %e, "Failed to enumerate store");
                stats.errors += 1;
                return stats;
            }
        };

        loop {
            let item = match dir.next_entry().await {
                Ok(Some(item)) => item,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Failed to advance store enumeration");
                    stats.errors += 1;
                    break;
                }
            };

            let name = item.file_name();
            let Some(name) = name.to_str() else { continue };

            if name.ends_with(TMP_SUFFIX) {
                self.sweep_staging_file(name, &mut stats).await;
                continue;
            }
            let Some(key) = name.strip_suffix(ENTRY_SUFFIX) else {
                continue;
            };
            // Foreign files that merely share the suffix are not entries
            if EntryStore::validate_key(key).is_err() {
                continue;
            }
            if item.file_type().await.map(|t| t.is_dir()).unwrap_or(true) {
                continue;
            }

            stats.scanned += 1;

            let Some(last_access) = self.access.last_access(&item.path()) else {
                // No access time means no idle signal; never evict on that.
                debug!(key = %key, "Skipping entry without access-time metadata");
                stats.skipped += 1;
                continue;
            };

            let idle = Utc::now() - last_access;
            if idle <= self.max_idle {
                continue;
            }

            match self.store.remove(key).await {
                Ok(true) => {
                    info!(key = %key, idle_secs = idle.num_seconds(), "Evicted idle cache entry");
                    stats.evicted += 1;
                }
                Ok(false) => {
                    // Already removed by a concurrent request; benign race
                    debug!(key = %key, "Entry vanished before eviction");
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to evict entry");
                    stats.errors += 1;
                }
            }
        }

        stats
    }

    /// Staging files are left behind when an upload crashes between writing
    /// and publishing. Remove them once they are idle past the threshold;
    /// live uploads are always younger than that.
    async fn sweep_staging_file(&self, name: &str, stats: &mut SweepStats) {
        let path = self.store.root().join(name);
        let Some(last_access) = self.access.last_access(&path) else {
            return;
        };
        if Utc::now() - last_access <= self.max_idle {
            return;
        }
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(file = %name, "Removed stale upload staging file");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(file = %name, error = %e, "Failed to remove staging file");
                stats.errors += 1;
            }
        }
    }
}
