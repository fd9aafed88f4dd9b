//! Cache Module
//!
//! Provides the in-process cache engine with per-record TTL expiry and
//! snapshot export/import.

mod codec;
mod entry;
mod order;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use codec::{
    decode, encode, ExportOptions, Expiry, ImportOptions, Snapshot, SnapshotRecord, NEVER_MARKER,
};
pub use entry::CacheRecord;
pub use order::InsertionOrder;
pub use stats::{CacheStats, HitCounter};
pub use store::{ttl_from_millis, Cache, CacheBuilder, CacheKey, CacheValue, ExpireCallback};
