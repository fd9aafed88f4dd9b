//! Configuration Module
//!
//! Handles loading cache and snapshot-tool configuration from environment variables.

use std::env;
use std::path::PathBuf;

// == Cache Config ==
/// Construction-time options for a `Cache`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheConfig {
    /// Start with hit/miss instrumentation and debug logging enabled
    pub debug: bool,
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }
}

/// Snapshot tool configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Enable cache debug mode
    pub debug: bool,
    /// Snapshot file read on start and rewritten on exit
    pub snapshot_path: PathBuf,
    /// Pretty-print width for the rewritten snapshot, compact when None
    pub snapshot_indent: Option<usize>,
    /// Keep existing keys when merging snapshots
    pub skip_duplicates: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DEBUG` - Enable debug mode (default: false)
    /// - `SNAPSHOT_PATH` - Snapshot file (default: cache-snapshot.json)
    /// - `SNAPSHOT_INDENT` - Indentation width (default: compact)
    /// - `SKIP_DUPLICATES` - Skip keys already present (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            debug: env::var("CACHE_DEBUG")
                .ok()
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.debug),
            snapshot_path: env::var("SNAPSHOT_PATH")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.snapshot_path),
            snapshot_indent: env::var("SNAPSHOT_INDENT")
                .ok()
                .and_then(|v| v.parse().ok())
                .or(defaults.snapshot_indent),
            skip_duplicates: env::var("SKIP_DUPLICATES")
                .ok()
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.skip_duplicates),
        }
    }

    /// Options for the cache this configuration drives.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new().debug(self.debug)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            snapshot_path: PathBuf::from("cache-snapshot.json"),
            snapshot_indent: None,
            skip_duplicates: false,
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
