//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache engine.
///
/// Every variant is raised synchronously by the call that violated it and
/// before that call mutates any state.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Bad TTL or other rejected argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Import snapshot text is not a valid snapshot
    #[error("Malformed snapshot: {0}")]
    Parse(#[source] serde_json::Error),

    /// A key or value could not be written into a snapshot
    #[error("Snapshot serialization failed: {0}")]
    Serialize(#[source] serde_json::Error),

    /// A timed entry was requested outside of a tokio runtime
    #[error("No tokio runtime available to schedule expiry")]
    NoRuntime,

    /// The injected logger failed
    #[error("Logger failed: {0}")]
    Logger(#[from] std::io::Error),
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;
