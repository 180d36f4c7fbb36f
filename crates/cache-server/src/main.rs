//! Blob cache server - content-addressable cache for build task outputs
//!
//! Clients PUT opaque payloads keyed by a task hash and GET them back on
//! later builds. A background sweeper evicts entries that have not been
//! read for longer than the configured threshold.

mod auth;
mod config;
mod error;
mod server;
mod types;

use crate::config::Config;
use crate::error::{Result, ServerError};
use crate::server::{start_server, ServerState, SharedState};
use cache_store::{EntryStore, FsAccessMeta, Sweeper};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env().add_directive("cache_server=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting blob cache server...");

    // Load configuration from environment
    let config = Config::from_env();
    info!("Port: {}", config.port);
    info!("Storage dir: {:?}", config.storage_dir);
    info!(
        "Cleanup threshold: {} seconds",
        config.cleanup_threshold_secs
    );
    info!("Sweep interval: {} seconds", config.sweep_interval_secs);
    if config.auth_token.is_some() {
        info!("Bearer auth enabled");
    } else {
        info!("Bearer auth disabled (no AUTH_TOKEN)");
    }

    // Create the store
    let store = EntryStore::new(&config.storage_dir);
    store.init().await?;

    // Spawn the eviction sweeper; the first pass runs immediately
    let sweeper = Sweeper::new(store.clone(), FsAccessMeta, config.cleanup_threshold());
    let sweep_interval = config.sweep_interval();
    tokio::spawn(async move {
        sweeper.run(sweep_interval).await;
    });

    // Create shared state
    let state: SharedState = Arc::new(ServerState::new(store, config.auth_token.clone()));

    // Start HTTP server (blocking)
    start_server(state, config.port)
        .await
        .map_err(ServerError::Io)?;

    Ok(())
}
