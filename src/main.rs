//! TTL Cache snapshot tool
//!
//! Loads a cache snapshot, drops the entries that have expired since it was
//! written, and rewrites it in place.

use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ttl_cache::{Cache, Config, ExportOptions, ImportOptions};

/// Main entry point for the snapshot tool.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the cache and import the snapshot file
/// 4. Write the compacted snapshot back
#[tokio::main]
async fn main() -> Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ttl_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Configuration loaded: snapshot_path={}, indent={:?}, skip_duplicates={}, debug={}",
        config.snapshot_path.display(),
        config.snapshot_indent,
        config.skip_duplicates,
        config.debug
    );

    let cache: Cache<String, Value> = Cache::from_config(&config.cache_config());

    let Some(text) = read_snapshot(&config.snapshot_path).await? else {
        warn!(
            "No snapshot at {}, nothing to compact",
            config.snapshot_path.display()
        );
        return Ok(());
    };

    let options = ImportOptions {
        skip_duplicates: config.skip_duplicates,
    };
    let size = cache
        .import(&text, options)
        .with_context(|| format!("Failed to import {}", config.snapshot_path.display()))?;
    info!("Imported {} live entries", size);

    let compacted = cache.export_with(&ExportOptions {
        indent: config.snapshot_indent,
    })?;
    tokio::fs::write(&config.snapshot_path, compacted)
        .await
        .with_context(|| format!("Failed to write {}", config.snapshot_path.display()))?;
    info!("Snapshot rewritten to {}", config.snapshot_path.display());

    Ok(())
}

/// Reads the snapshot file, None if it does not exist.
async fn read_snapshot(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}
