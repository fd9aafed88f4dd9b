//! Cache Store Module
//!
//! Main cache engine combining the record table, per-record expiry timers,
//! hit/miss instrumentation and snapshot export/import.

use std::collections::HashMap;
use std::fmt::{self, Debug, Display};
use std::hash::Hash;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, error, trace};

use crate::cache::codec::{self, Expiry, ExportOptions, ImportOptions, Snapshot, SnapshotRecord};
use crate::cache::{CacheRecord, CacheStats, HitCounter, InsertionOrder};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::logger::{CacheLogger, TracingLogger};
use crate::tasks::{spawn_expiry_task, TimerHandle};

/// Bounds every cache key satisfies.
///
/// `Display` is the key's text in debug messages.
pub trait CacheKey: Eq + Hash + Clone + Debug + Display + Send + Sync + 'static {}

impl<T> CacheKey for T where T: Eq + Hash + Clone + Debug + Display + Send + Sync + 'static {}

/// Bounds every cached value satisfies.
pub trait CacheValue: Clone + Debug + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Clone + Debug + Send + Sync + 'static {}

/// Invoked with the key and value of a record removed by its own timer.
pub type ExpireCallback<K, V> = Arc<dyn Fn(&K, &V) + Send + Sync>;

// == TTL Validation ==
/// Converts a millisecond TTL into a `Duration`.
///
/// Fails with `InvalidArgument` unless `ms` is finite and positive.
pub fn ttl_from_millis(ms: f64) -> Result<Duration> {
    if !ms.is_finite() || ms <= 0.0 {
        return Err(CacheError::InvalidArgument(format!(
            "Cache timeout must be a positive number of milliseconds, got {}",
            ms
        )));
    }
    Duration::try_from_secs_f64(ms / 1000.0)
        .map_err(|e| CacheError::InvalidArgument(format!("Cache timeout {}ms: {}", ms, e)))
}

fn deadline_after(now: Instant, ttl: Duration) -> Result<Instant> {
    if ttl.is_zero() {
        return Err(CacheError::InvalidArgument(
            "Cache timeout must be a positive duration".to_string(),
        ));
    }
    now.checked_add(ttl).ok_or_else(|| {
        CacheError::InvalidArgument(format!("Cache timeout {:?} is out of range", ttl))
    })
}

fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

// == Debug Trace ==
fn caching_message<K: Display, V: Debug>(key: &K, value: &V, ttl: Option<Duration>) -> String {
    let ttl_text = ttl.map_or_else(|| "none".to_string(), |ttl| format!("{:?}", ttl));
    format!("Caching: {}: {:?} {}", key, value, ttl_text)
}

fn size_message(size: usize) -> String {
    format!("Current cache size: {}", size)
}

// == Cache Inner ==
/// State guarded by the single cache lock.
///
/// Timer fires take the same lock, so every mutation and every fire is linearized.
struct Inner<K, V> {
    records: HashMap<K, CacheRecord<V>>,
    order: InsertionOrder<K>,
    /// Maintained count; must equal `records.len()`
    size: usize,
    /// Hit/miss counters; their enabled flag is the cache's debug mode
    stats: HitCounter,
    logger: Arc<dyn CacheLogger>,
    runtime: Option<Handle>,
    next_token: u64,
}

impl<K: CacheKey, V: CacheValue> Inner<K, V> {
    /// Runtime new timers are spawned on.
    ///
    /// Without an explicit handle this is the runtime current at the call,
    /// so a cache outlives the runtime it was built in.
    fn runtime(&self) -> Result<Handle> {
        self.runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
            .ok_or(CacheError::NoRuntime)
    }

    /// Stores a record, replacing any existing one for `key`.
    ///
    /// The replaced record's timer is cancelled before the new one is armed.
    fn insert(
        &mut self,
        shared: &Weak<Mutex<Self>>,
        key: K,
        value: V,
        expiry: Option<(Instant, Handle)>,
        on_expire: Option<ExpireCallback<K, V>>,
    ) {
        if let Some(existing) = self.records.get_mut(&key) {
            existing.cancel_timer();
        }

        let (deadline, timer) = match expiry {
            Some((deadline, runtime)) => {
                let timer = self.arm(shared, &runtime, key.clone(), deadline, on_expire);
                (Some(deadline), Some(timer))
            }
            None => (None, None),
        };

        match self.records.get_mut(&key) {
            Some(record) => {
                record.value = value;
                record.deadline = deadline;
                record.timer = timer;
            }
            None => {
                let seq = self.order.push(key.clone());
                self.records
                    .insert(key, CacheRecord::new(value, deadline, timer, seq));
                self.size += 1;
            }
        }
    }

    fn arm(
        &mut self,
        shared: &Weak<Mutex<Self>>,
        runtime: &Handle,
        key: K,
        deadline: Instant,
        on_expire: Option<ExpireCallback<K, V>>,
    ) -> TimerHandle {
        let token = self.next_token;
        self.next_token += 1;
        trace!(?key, token, "Arming expiry timer");

        let shared = shared.clone();
        spawn_expiry_task(runtime, token, deadline, move |token| {
            fire(&shared, key, token, on_expire)
        })
    }

    /// Unlinks a record from the table and the insertion order.
    ///
    /// The returned record still owns its timer.
    fn remove_record(&mut self, key: &K) -> Option<CacheRecord<V>> {
        let record = self.records.remove(key)?;
        self.order.remove(record.seq);
        self.size -= 1;
        Some(record)
    }

    /// Removes the record for `key` if it is still armed with `token`.
    fn take_armed(&mut self, key: &K, token: u64) -> Option<V> {
        let armed = self
            .records
            .get(key)
            .is_some_and(|record| record.is_armed_with(token));
        if !armed {
            trace!(?key, token, "Ignoring superseded expiry timer");
            return None;
        }

        let mut record = self.remove_record(key)?;
        if let Some(timer) = record.timer.take() {
            timer.detach();
        }
        Some(record.value)
    }

    fn debug(&self) -> bool {
        self.stats.is_enabled()
    }
}

/// Fire action of a record's timer.
fn fire<K: CacheKey, V: CacheValue>(
    shared: &Weak<Mutex<Inner<K, V>>>,
    key: K,
    token: u64,
    on_expire: Option<ExpireCallback<K, V>>,
) {
    let Some(shared) = shared.upgrade() else {
        return;
    };

    // Lock is released before the callback runs so it may call back into the cache
    let expired = shared.lock().take_armed(&key, token);
    let Some(value) = expired else {
        return;
    };
    debug!(?key, "Cache record expired");

    if let Some(callback) = on_expire {
        // No caller waits on a timer task, so a panic is reported here before it unwinds the task
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(&key, &value))) {
            error!(key = %key, "Expiry callback panicked");
            panic::resume_unwind(payload);
        }
    }
}

// == Cache ==
/// In-process key/value cache with per-record TTL expiry.
///
/// `Cache` is a handle; clones share the same records. Timed records need a
/// tokio runtime, either the one given to `CacheBuilder::runtime` or the one
/// current when `put` is called.
///
/// # Example
/// ```ignore
/// let cache: Cache<String, String> = Cache::new();
/// cache.put("dog:1".to_string(), "Rex".to_string(), Some(Duration::from_secs(60)), None)?;
/// assert_eq!(cache.get(&"dog:1".to_string()), Some("Rex".to_string()));
/// ```
pub struct Cache<K, V> {
    shared: Arc<Mutex<Inner<K, V>>>,
}

impl<K, V> Clone for Cache<K, V> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<K: CacheKey, V: CacheValue> Default for Cache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: CacheKey, V: CacheValue> Debug for Cache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("Cache")
            .field("size", &inner.size)
            .field("debug", &inner.debug())
            .finish()
    }
}

impl<K: CacheKey, V: CacheValue> Cache<K, V> {
    // == Constructors ==
    /// Creates an empty cache with debug mode off and the tracing logger.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates an empty cache from construction-time options.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::builder().debug(config.debug).build()
    }

    pub fn builder() -> CacheBuilder<K, V> {
        CacheBuilder::new()
    }

    fn weak(&self) -> Weak<Mutex<Inner<K, V>>> {
        Arc::downgrade(&self.shared)
    }

    fn log_context(&self) -> (bool, Arc<dyn CacheLogger>) {
        let inner = self.shared.lock();
        (inner.debug(), inner.logger.clone())
    }

    // == Put ==
    /// Stores `value` under `key` and returns it.
    ///
    /// Any record already stored under `key` is replaced together with its
    /// timer. With a `ttl` the record is removed once it elapses and
    /// `on_expire` is called with the removed key and value. `delete` and
    /// `clear` never call `on_expire`.
    ///
    /// # Errors
    /// - `InvalidArgument` if `ttl` is zero or out of range
    /// - `NoRuntime` if `ttl` is given and no tokio runtime is reachable
    /// - `Logger` if debug mode is on and the logger fails
    pub fn put(
        &self,
        key: K,
        value: V,
        ttl: Option<Duration>,
        on_expire: Option<ExpireCallback<K, V>>,
    ) -> Result<V> {
        let deadline = ttl
            .map(|ttl| deadline_after(Instant::now(), ttl))
            .transpose()?;

        let (debug, logger) = self.log_context();
        if debug {
            logger.log(&caching_message(&key, &value, ttl))?;
        }

        let size = {
            let mut inner = self.shared.lock();
            let expiry = match deadline {
                Some(deadline) => Some((deadline, inner.runtime()?)),
                None => None,
            };
            inner.insert(&self.weak(), key, value.clone(), expiry, on_expire);
            inner.size
        };

        if debug {
            logger.log(&size_message(size))?;
        }
        Ok(value)
    }

    // == Get ==
    /// Returns the value stored under `key`.
    ///
    /// A record whose deadline has been reached is removed here and reported
    /// as a miss.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.shared.lock();
        let now = Instant::now();

        let found = inner.records.get(key).map(|record| {
            if record.is_expired(now) {
                None
            } else {
                Some(record.value.clone())
            }
        });

        match found {
            Some(Some(value)) => {
                inner.stats.record(true);
                Some(value)
            }
            Some(None) => {
                if let Some(mut record) = inner.remove_record(key) {
                    record.cancel_timer();
                }
                trace!(?key, "Removed expired record on read");
                inner.stats.record(false);
                None
            }
            None => {
                inner.stats.record(false);
                None
            }
        }
    }

    // == Delete ==
    /// Removes the record stored under `key`.
    ///
    /// Returns false if `key` is absent or its deadline already passed. The
    /// timer is cancelled either way, but an expired record stays in place
    /// until a read or an import removes it.
    pub fn delete(&self, key: &K) -> bool {
        let mut inner = self.shared.lock();
        let now = Instant::now();

        let Some(record) = inner.records.get_mut(key) else {
            return false;
        };
        record.cancel_timer();
        if record.deadline_passed(now) {
            trace!(?key, "Refusing to delete expired record");
            return false;
        }

        inner.remove_record(key);
        true
    }

    // == Clear ==
    /// Removes every record without calling any expiry callback.
    ///
    /// Hit/miss counters are zeroed only while debug mode is on.
    pub fn clear(&self) {
        let mut inner = self.shared.lock();
        for record in inner.records.values_mut() {
            record.cancel_timer();
        }
        inner.records.clear();
        inner.order.clear();
        inner.size = 0;
        inner.stats.clear();
    }

    // == Keys ==
    /// All stored keys in insertion order, including expired records not yet removed.
    pub fn keys(&self) -> Vec<K> {
        self.shared.lock().order.iter().cloned().collect()
    }

    // == Size ==
    /// Number of stored records.
    pub fn size(&self) -> usize {
        self.shared.lock().size
    }

    // == Memory Size ==
    /// Number of stored records counted by walking the table.
    ///
    /// Differs from `size` only if the maintained count has drifted.
    pub fn mem_size(&self) -> usize {
        self.shared.lock().records.keys().count()
    }

    // == Debug Mode ==
    /// Turns hit/miss counting and debug logging on or off. Counters are kept.
    pub fn debug(&self, enabled: bool) {
        self.shared.lock().stats.set_enabled(enabled);
    }

    pub fn is_debug(&self) -> bool {
        self.shared.lock().debug()
    }

    /// Reads counted as hits, 0 while debug mode is off.
    pub fn hits(&self) -> u64 {
        self.shared.lock().stats.hits()
    }

    /// Reads counted as misses, 0 while debug mode is off.
    pub fn misses(&self) -> u64 {
        self.shared.lock().stats.misses()
    }

    // == Stats ==
    /// Current counters and entry count.
    pub fn stats(&self) -> CacheStats {
        let inner = self.shared.lock();
        inner.stats.report(inner.size)
    }

    // == Logger ==
    /// Replaces the logger debug messages are written to.
    pub fn set_logger(&self, logger: Arc<dyn CacheLogger>) {
        self.shared.lock().logger = logger;
    }
}

impl<K, V> Cache<K, V>
where
    K: CacheKey + Serialize + DeserializeOwned,
    V: CacheValue + Serialize + DeserializeOwned,
{
    // == Snapshot ==
    /// Point-in-time copy of every stored record, expired ones included.
    pub fn snapshot(&self) -> Snapshot<K, V> {
        let inner = self.shared.lock();
        let now = Instant::now();
        let now_ms = Utc::now().timestamp_millis();

        let entries = inner
            .order
            .iter()
            .filter_map(|key| {
                let record = inner.records.get(key)?;
                // A passed deadline exports as `now_ms`, which an import drops as expired
                let expire = match record.ttl_remaining(now) {
                    Some(remaining) => Expiry::At(now_ms.saturating_add(duration_ms(remaining))),
                    None => Expiry::Never,
                };
                let record = SnapshotRecord {
                    value: record.value.clone(),
                    expire,
                };
                Some((key.clone(), record))
            })
            .collect();

        Snapshot::new(entries)
    }

    // == Export ==
    /// Serializes every stored record as compact snapshot text.
    pub fn export(&self) -> Result<String> {
        self.export_with(&ExportOptions::default())
    }

    pub fn export_with(&self, options: &ExportOptions) -> Result<String> {
        codec::encode(&self.snapshot(), options)
    }

    // == Import ==
    /// Merges snapshot text into this cache and returns the resulting size.
    ///
    /// Entries already past their expiry are not imported and any record
    /// under the same key is removed. Other entries are stored like `put`
    /// with their remaining lifetime, unless `skip_duplicates` is set and
    /// the key already exists.
    ///
    /// # Errors
    /// - `Parse` if `text` is not a snapshot; nothing is modified
    /// - `NoRuntime` if a timed entry needs arming and no runtime is reachable
    /// - `Logger` if debug mode is on and the logger fails; the import has
    ///   already been applied, since each stored entry is logged like a `put`
    ///   once the lock is released
    pub fn import(&self, text: &str, options: ImportOptions) -> Result<usize> {
        let snapshot = codec::decode(text)?;
        self.import_snapshot(snapshot, options)
    }

    pub fn import_snapshot(&self, snapshot: Snapshot<K, V>, options: ImportOptions) -> Result<usize> {
        let now = Instant::now();
        let now_ms = Utc::now().timestamp_millis();

        // Resolve every deadline first so a bad entry fails the import before any mutation
        let mut planned = Vec::with_capacity(snapshot.len());
        for (key, record) in snapshot.entries {
            let import = match record.expire.remaining_ms(now_ms) {
                Some(remaining) if remaining <= 0 => PlannedImport::Expired(key),
                Some(remaining) => {
                    let ttl = Duration::from_millis(remaining.unsigned_abs());
                    let deadline = deadline_after(now, ttl)?;
                    PlannedImport::Store(key, record.value, Some((ttl, deadline)))
                }
                None => PlannedImport::Store(key, record.value, None),
            };
            planned.push(import);
        }

        let weak = self.weak();
        // Debug messages are collected under the lock and written after it is released
        let mut trace_lines = Vec::new();
        let mut skipped = 0usize;
        let (size, logger) = {
            let mut inner = self.shared.lock();
            let needs_runtime = planned
                .iter()
                .any(|import| matches!(import, PlannedImport::Store(_, _, Some(_))));
            let runtime = if needs_runtime {
                Some(inner.runtime()?)
            } else {
                None
            };

            for import in planned {
                match import {
                    PlannedImport::Expired(key) => {
                        if let Some(mut stale) = inner.remove_record(&key) {
                            stale.cancel_timer();
                        }
                        trace!(?key, "Dropped expired snapshot entry");
                    }
                    PlannedImport::Store(key, _, _)
                        if options.skip_duplicates && inner.records.contains_key(&key) =>
                    {
                        skipped += 1;
                        if inner.debug() {
                            trace_lines.push(format!("Skipping duplicate imported key {}", key));
                        }
                    }
                    PlannedImport::Store(key, value, lifetime) => {
                        let expiry = match (lifetime, &runtime) {
                            (Some((_, deadline)), Some(runtime)) => {
                                Some((deadline, runtime.clone()))
                            }
                            (Some(_), None) => return Err(CacheError::NoRuntime),
                            (None, _) => None,
                        };
                        if inner.debug() {
                            let ttl = lifetime.map(|(ttl, _)| ttl);
                            trace_lines.push(caching_message(&key, &value, ttl));
                        }
                        inner.insert(&weak, key, value, expiry, None);
                        if inner.debug() {
                            trace_lines.push(size_message(inner.size));
                        }
                    }
                }
            }

            debug!(size = inner.size, skipped, "Imported snapshot");
            (inner.size, inner.logger.clone())
        };

        for line in &trace_lines {
            logger.log(line)?;
        }
        Ok(size)
    }
}

enum PlannedImport<K, V> {
    Expired(K),
    /// Value plus remaining lifetime and the deadline it was resolved to
    Store(K, V, Option<(Duration, Instant)>),
}

// == Cache Builder ==
/// Configures a `Cache` before construction.
pub struct CacheBuilder<K, V> {
    debug: bool,
    logger: Option<Arc<dyn CacheLogger>>,
    runtime: Option<Handle>,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K: CacheKey, V: CacheValue> CacheBuilder<K, V> {
    pub fn new() -> Self {
        Self {
            debug: false,
            logger: None,
            runtime: None,
            _marker: PhantomData,
        }
    }

    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    pub fn logger(mut self, logger: Arc<dyn CacheLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Runtime expiry timers are spawned on.
    ///
    /// Without one, each timed `put` or import uses the runtime current at
    /// that call. Set it to make timed puts from outside any runtime.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Cache<K, V> {
        let inner = Inner {
            records: HashMap::new(),
            order: InsertionOrder::new(),
            size: 0,
            stats: HitCounter::new(self.debug),
            logger: self.logger.unwrap_or_else(|| Arc::new(TracingLogger)),
            runtime: self.runtime,
            next_token: 0,
        };
        Cache {
            shared: Arc::new(Mutex::new(inner)),
        }
    }
}

impl<K: CacheKey, V: CacheValue> Default for CacheBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
