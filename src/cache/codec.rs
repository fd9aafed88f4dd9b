//! Snapshot Codec Module
//!
//! JSON snapshot format for exporting and importing cache contents:
//!
//! ```text
//! { "<key>": { "value": <value>, "expire": <unix-ms> | "never" }, ... }
//! ```
//!
//! Entries keep the order they had in the cache (export) or in the text (import).

use std::fmt;
use std::marker::PhantomData;

use serde::de::{self, DeserializeOwned, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CacheError, Result};

/// Marker written for records without a deadline.
pub const NEVER_MARKER: &str = "never";

/// Marker older snapshots used for records without a deadline.
const LEGACY_NEVER_MARKER: &str = "NaN";

// == Expiry ==
/// Absolute expiry of a snapshot entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Never expires
    Never,
    /// Expires at this wall-clock Unix timestamp in milliseconds
    At(i64),
}

impl Expiry {
    /// Milliseconds left at `now_ms`, None for `Never`. May be zero or negative.
    pub fn remaining_ms(&self, now_ms: i64) -> Option<i64> {
        match self {
            Expiry::Never => None,
            Expiry::At(at) => Some(at.saturating_sub(now_ms)),
        }
    }
}

impl Serialize for Expiry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Expiry::Never => serializer.serialize_str(NEVER_MARKER),
            Expiry::At(at) => serializer.serialize_i64(*at),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ExpiryRepr {
    Millis(i64),
    FractionalMillis(f64),
    Marker(String),
}

impl<'de> Deserialize<'de> for Expiry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match ExpiryRepr::deserialize(deserializer)? {
            ExpiryRepr::Millis(at) => Ok(Expiry::At(at)),
            ExpiryRepr::FractionalMillis(at) => Ok(Expiry::At(at.ceil() as i64)),
            ExpiryRepr::Marker(marker) if marker == NEVER_MARKER || marker == LEGACY_NEVER_MARKER => {
                Ok(Expiry::Never)
            }
            ExpiryRepr::Marker(other) => Err(de::Error::custom(format!(
                "expected a timestamp or \"{}\", found \"{}\"",
                NEVER_MARKER, other
            ))),
        }
    }
}

// == Snapshot Record ==
/// One exported entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord<V> {
    pub value: V,
    pub expire: Expiry,
}

// == Snapshot ==
/// An ordered set of exported entries.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<K, V> {
    pub entries: Vec<(K, SnapshotRecord<V>)>,
}

impl<K, V> Snapshot<K, V> {
    pub fn new(entries: Vec<(K, SnapshotRecord<V>)>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Serialize, V: Serialize> Serialize for Snapshot<K, V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, record) in &self.entries {
            map.serialize_entry(key, record)?;
        }
        map.end()
    }
}

struct SnapshotVisitor<K, V>(PhantomData<(K, V)>);

impl<'de, K, V> Visitor<'de> for SnapshotVisitor<K, V>
where
    K: Deserialize<'de>,
    V: Deserialize<'de>,
{
    type Value = Snapshot<K, V>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map of cache keys to {value, expire} records")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, record)) = access.next_entry()? {
            entries.push((key, record));
        }
        Ok(Snapshot { entries })
    }
}

impl<'de, K, V> Deserialize<'de> for Snapshot<K, V>
where
    K: Deserialize<'de>,
    V: Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(SnapshotVisitor(PhantomData))
    }
}

// == Export Options ==
/// Formatting of exported snapshot text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// Pretty-print with this many spaces per level; compact when None
    pub indent: Option<usize>,
}

impl ExportOptions {
    pub fn pretty(indent: usize) -> Self {
        Self {
            indent: Some(indent),
        }
    }
}

// == Import Options ==
/// Conflict policy for importing into a non-empty cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Leave keys that already exist in the destination untouched
    pub skip_duplicates: bool,
}

impl ImportOptions {
    pub fn skip_duplicates() -> Self {
        Self {
            skip_duplicates: true,
        }
    }
}

// == Encode ==
/// Renders a snapshot as JSON text.
pub fn encode<K, V>(snapshot: &Snapshot<K, V>, options: &ExportOptions) -> Result<String>
where
    K: Serialize,
    V: Serialize,
{
    match options.indent {
        None => serde_json::to_string(snapshot).map_err(CacheError::Serialize),
        Some(width) => {
            let indent = vec![b' '; width];
            let formatter = serde_json::ser::PrettyFormatter::with_indent(&indent);
            let mut buf = Vec::new();
            let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
            snapshot
                .serialize(&mut serializer)
                .map_err(CacheError::Serialize)?;
            // serde_json only ever writes valid UTF-8
            Ok(String::from_utf8_lossy(&buf).into_owned())
        }
    }
}

// == Decode ==
/// Parses snapshot text. Fails with `CacheError::Parse` on malformed input.
pub fn decode<K, V>(text: &str) -> Result<Snapshot<K, V>>
where
    K: DeserializeOwned,
    V: DeserializeOwned,
{
    serde_json::from_str(text).map_err(CacheError::Parse)
}
