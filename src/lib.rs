//! TTL Cache - An in-process, time-aware key/value cache
//!
//! Entries carry an optional time-to-live, expire through a scheduled timer
//! or lazily on access, and can be exported to and imported from JSON
//! snapshots.

pub mod cache;
pub mod config;
pub mod error;
pub mod logger;
pub mod tasks;

pub use cache::{Cache, CacheBuilder, ExpireCallback, ExportOptions, ImportOptions};
pub use config::{CacheConfig, Config};
pub use error::{CacheError, Result};
pub use logger::{CacheLogger, NoopLogger, TracingLogger, WriterLogger};
