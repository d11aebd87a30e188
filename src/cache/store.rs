//! In-process key/value store with per-entry expiration.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::clock::{Clock, SystemClock};
use super::stats::{CacheStats, HitCounters};

/// Default time-to-live applied when a caller passes no TTL.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);
/// Default interval between background expiry sweeps.
pub const DEFAULT_CHECK_PERIOD: Duration = Duration::from_secs(120);

/// Tuning for a [`TtlCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// TTL used by `set` when the caller passes `None` or zero.
    /// A zero default means such entries never expire.
    pub default_ttl: Duration,
    /// Interval of the background sweep. Zero disables the sweeper.
    pub check_period: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            check_period: DEFAULT_CHECK_PERIOD,
        }
    }
}

/// When an entry stops being visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Expiration {
    /// The entry lives until deleted or flushed.
    Never,
    /// The entry is visible up to and including this epoch millisecond.
    At(u64),
}

impl Expiration {
    fn from_ttl_ms(now_ms: u64, ttl_ms: u64) -> Self {
        if ttl_ms == 0 {
            Expiration::Never
        } else {
            Expiration::At(now_ms.saturating_add(ttl_ms))
        }
    }

    /// The single expiry predicate shared by reads and the sweep.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        match self {
            Expiration::Never => false,
            Expiration::At(at) => *at < now_ms,
        }
    }
}

struct Entry<V> {
    value: V,
    expires: Expiration,
}

/// Entries plus an index of expiring keys ordered by expiry time.
struct Store<V> {
    entries: HashMap<String, Entry<V>>,
    expiry_index: BTreeSet<(u64, String)>,
}

impl<V> Store<V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            expiry_index: BTreeSet::new(),
        }
    }

    fn insert(&mut self, key: String, value: V, expires: Expiration) {
        self.remove(&key);
        if let Expiration::At(at) = expires {
            self.expiry_index.insert((at, key.clone()));
        }
        self.entries.insert(key, Entry { value, expires });
    }

    fn remove(&mut self, key: &str) -> Option<Entry<V>> {
        let entry = self.entries.remove(key)?;
        if let Expiration::At(at) = entry.expires {
            self.expiry_index.remove(&(at, key.to_string()));
        }
        Some(entry)
    }

    /// Drop `key` if it has expired. Returns `true` when something was evicted.
    fn evict_if_expired(&mut self, key: &str, now_ms: u64) -> bool {
        let expired = self
            .entries
            .get(key)
            .map(|entry| entry.expires.is_expired(now_ms))
            .unwrap_or(false);

        if expired {
            self.remove(key);
            debug!(key = %key, "Cache key expired");
        }
        expired
    }

    fn live(&mut self, key: &str, now_ms: u64) -> Option<&Entry<V>> {
        self.evict_if_expired(key, now_ms);
        self.entries.get(key)
    }

    /// Remove the earliest-expiring key if it is already expired.
    fn pop_expired(&mut self, now_ms: u64) -> Option<String> {
        let (at, _) = self.expiry_index.first()?;
        if !Expiration::At(*at).is_expired(now_ms) {
            return None;
        }
        let (_, key) = self.expiry_index.pop_first()?;
        self.entries.remove(&key);
        Some(key)
    }

    fn purge_expired(&mut self, now_ms: u64) -> usize {
        let mut purged = 0;
        while let Some(key) = self.pop_expired(now_ms) {
            debug!(key = %key, "Cache key expired");
            purged += 1;
        }
        purged
    }
}

/// A thread-safe key/value cache with per-entry TTL and hit/miss counters.
///
/// Expired entries are never returned: reads check expiry lazily and a
/// background sweeper (see [`TtlCache::spawn_sweeper`]) removes them actively.
/// Both paths consult the same ordered expiry index.
pub struct TtlCache<V> {
    store: Mutex<Store<V>>,
    counters: HitCounters,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache that reads time from the system clock.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a cache with an explicit time source.
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Mutex::new(Store::new()),
            counters: HitCounters::default(),
            config,
            clock,
        }
    }

    /// Look up a live value, counting a hit or a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now_ms();
        let value = {
            let mut store = self.store.lock();
            store.live(key, now).map(|entry| entry.value.clone())
        };
        self.counters.record(value.is_some());
        value
    }

    /// Insert or overwrite `key`.
    ///
    /// `None` or `Some(0)` selects the configured default TTL.
    /// Always returns `true`.
    pub fn set(&self, key: impl Into<String>, value: V, ttl_secs: Option<u64>) -> bool {
        let now = self.clock.now_ms();
        let expires = Expiration::from_ttl_ms(now, self.effective_ttl_ms(ttl_secs));
        self.store.lock().insert(key.into(), value, expires);
        true
    }

    /// Atomically read, transform and store the value under `key`.
    ///
    /// `f` sees the live value (if any) and the current time, and returns the
    /// value to store, its TTL in seconds (same rules as [`TtlCache::set`]) and
    /// a result handed back to the caller. The lookup counts as a hit or miss.
    /// The cache lock is held for the whole call, so `f` must not call back
    /// into this cache.
    pub fn compute<R, F>(&self, key: &str, f: F) -> R
    where
        F: FnOnce(Option<&V>, u64) -> (V, Option<u64>, R),
    {
        let now = self.clock.now_ms();
        let mut store = self.store.lock();

        let current = store.live(key, now).map(|entry| &entry.value);
        self.counters.record(current.is_some());

        let (value, ttl_secs, result) = f(current, now);
        let expires = Expiration::from_ttl_ms(now, self.effective_ttl_ms(ttl_secs));
        store.insert(key.to_string(), value, expires);
        result
    }

    /// Remove a single key. Returns the number of live entries removed.
    pub fn delete(&self, key: &str) -> usize {
        let now = self.clock.now_ms();
        let mut store = self.store.lock();
        match store.remove(key) {
            Some(entry) if !entry.expires.is_expired(now) => 1,
            _ => 0,
        }
    }

    /// Remove every live key containing `pattern`. Returns the number removed.
    pub fn delete_by_pattern(&self, pattern: &str) -> usize {
        let now = self.clock.now_ms();
        let mut store = self.store.lock();
        store.purge_expired(now);

        let matching: Vec<String> = store
            .entries
            .keys()
            .filter(|key| key.contains(pattern))
            .cloned()
            .collect();
        for key in &matching {
            store.remove(key);
        }

        debug!(pattern = %pattern, removed = matching.len(), "Deleted cache keys by pattern");
        matching.len()
    }

    /// Drop every entry and reset the hit/miss counters.
    pub fn flush(&self) {
        *self.store.lock() = Store::new();
        self.counters.reset();
        info!("Cache flushed");
    }

    /// Whether `key` holds a live value. Does not count as a lookup.
    pub fn has(&self, key: &str) -> bool {
        let now = self.clock.now_ms();
        self.store.lock().live(key, now).is_some()
    }

    /// The expiration of a live key.
    pub fn get_ttl(&self, key: &str) -> Option<Expiration> {
        let now = self.clock.now_ms();
        self.store.lock().live(key, now).map(|entry| entry.expires)
    }

    /// All live keys, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        let now = self.clock.now_ms();
        let mut store = self.store.lock();
        store.purge_expired(now);
        store.entries.keys().cloned().collect()
    }

    /// Number of live keys.
    pub fn key_count(&self) -> usize {
        let now = self.clock.now_ms();
        let mut store = self.store.lock();
        store.purge_expired(now);
        store.entries.len()
    }

    /// Hit/miss counters plus the live key count.
    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.key_count())
    }

    /// Evict every expired entry, one lock acquisition per key.
    ///
    /// Returns the number of evicted keys.
    pub fn sweep_expired(&self) -> usize {
        let mut evicted = 0;
        loop {
            let now = self.clock.now_ms();
            let Some(key) = self.store.lock().pop_expired(now) else {
                break;
            };
            debug!(key = %key, "Cache key expired");
            evicted += 1;
        }
        evicted
    }

    fn effective_ttl_ms(&self, ttl_secs: Option<u64>) -> u64 {
        match ttl_secs {
            Some(secs) if secs > 0 => secs.saturating_mul(1000),
            _ => self.config.default_ttl.as_millis() as u64,
        }
    }
}

impl<V: Clone + Send + 'static> TtlCache<V> {
    /// Start the periodic expiry sweep on the current tokio runtime.
    ///
    /// Returns `None` when the configured check period is zero.
    pub fn spawn_sweeper(self: &Arc<Self>) -> Option<SweeperHandle> {
        let period = self.config.check_period;
        if period.is_zero() {
            info!("Cache sweeper disabled");
            return None;
        }

        let cache = Arc::clone(self);
        let task = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            loop {
                ticker.tick().await;
                let evicted = cache.sweep_expired();
                if evicted > 0 {
                    debug!(evicted = evicted, "Cache sweep completed");
                }
            }
        });

        info!(period_secs = period.as_secs(), "Cache sweeper started");
        Some(SweeperHandle { task })
    }
}

/// Handle to the background sweep task. Dropping it stops the sweep.
pub struct SweeperHandle {
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweep task.
    pub fn shutdown(self) {
        self.task.abort();
        info!("Cache sweeper stopped");
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
