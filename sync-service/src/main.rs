//! fedsync-service binary entry point.
//!
//! Opens the sync database, applies migrations and keeps abandoned locks
//! swept until interrupted.
//!
//! Usage:
//! ```bash
//! fedsync-service --config fedsync.toml
//! ```

use anyhow::{Context, Result};
use fedsync_service::cleanup::spawn_cleanup_task;
use fedsync_service::config::Config;
use fedsync_service::storage::SqliteStorage;
use std::path::PathBuf;
use std::sync::Arc;
use sync_core::LockPolicy;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = get_config_path();
    let config = if config_path.exists() {
        Config::from_file(&config_path)
            .with_context(|| format!("Failed to load {}", config_path.display()))?
    } else {
        tracing::warn!(path = %config_path.display(), "Config file not found, using defaults");
        Config::default()
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        instance = %config.instance.address,
        database = %config.storage.database.display(),
        "Starting fedsync-service"
    );

    let storage = Arc::new(
        SqliteStorage::new(&config.storage.database)
            .await
            .context("Failed to open sync database")?,
    );
    let cleanup = spawn_cleanup_task(
        storage,
        config.cleanup.clone(),
        LockPolicy::new(config.locks.stale_after()),
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    tracing::info!("Shutting down");
    cleanup.abort();
    Ok(())
}

fn get_config_path() -> PathBuf {
    std::env::args()
        .skip_while(|arg| arg != "--config")
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("fedsync.toml"))
}
