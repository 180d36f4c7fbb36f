use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration parsed from environment variables
///
/// Built once at startup and handed to the store, sweeper, and server;
/// nothing else reads the process environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub storage_dir: PathBuf,
    pub auth_token: Option<String>,
    pub cleanup_threshold_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Config {
    /// Parse configuration from environment variables
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8090);

        let storage_dir = env::var("STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| env::temp_dir());

        let auth_token = env::var("AUTH_TOKEN").ok().filter(|t| !t.is_empty());

        let cleanup_threshold_secs = env::var("CLEANUP_THRESHOLD_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3600); // 1 hour default

        // Independent of the eviction threshold, but defaults to it so an
        // entry is swept within one threshold-length of going stale.
        let sweep_interval_secs = env::var("SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(cleanup_threshold_secs);

        Self {
            port,
            storage_dir,
            auth_token,
            cleanup_threshold_secs,
            sweep_interval_secs,
        }
    }

    pub fn cleanup_threshold(&self) -> Duration {
        Duration::from_secs(self.cleanup_threshold_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        // interval() panics on a zero period
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}
