//! Capacity- and age-bounded LRU cache.
//!
//! Entries live in an [`lru::LruCache`] behind a single mutex, so compound
//! operations ("check, then write") are atomic and the resident count never
//! exceeds capacity. Entries older than the configured maximum age are
//! treated as absent by every read and dropped when next touched.
//!
//! A fetch delegate, when configured, runs outside the lock. Two threads
//! missing the same key at once may both fetch it; the last insert wins.

use crate::error::{BoxError, Error, Result};
use crate::types::CacheStats;
use lru::LruCache;
use parking_lot::Mutex;
use std::fmt;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Delegate invoked by [`BoundedCache::get`] on a miss.
pub type FetchFn<K, V> = Arc<dyn Fn(&K) -> std::result::Result<V, BoxError> + Send + Sync>;

struct Slot<V> {
    value: V,
    inserted_at: Instant,
}

/// Outcome of [`BoundedCache::update_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update {
    /// The update function declined; nothing changed.
    Unchanged,
    /// A value was stored. `evicted` is set when storing it pushed the least
    /// recently used entry out.
    Stored { evicted: bool },
}

impl Update {
    pub fn is_stored(&self) -> bool {
        matches!(self, Update::Stored { .. })
    }
}

/// A fixed-capacity least-recently-used cache.
pub struct BoundedCache<K, V> {
    capacity: usize,
    max_age: Option<Duration>,
    fetcher: Option<FetchFn<K, V>>,
    entries: Mutex<LruCache<K, Slot<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache holding at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        // `LruCache::new` preallocates the whole capacity; grow on demand instead.
        let mut entries = LruCache::unbounded();
        entries.resize(capacity);
        Self {
            capacity: capacity.get(),
            max_age: None,
            fetcher: None,
            entries: Mutex::new(entries),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Treat entries older than `max_age` as absent.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Fetch missing keys through `fetcher` in [`get`](Self::get).
    pub fn with_fetcher<F>(mut self, fetcher: F) -> Self
    where
        F: Fn(&K) -> std::result::Result<V, BoxError> + Send + Sync + 'static,
    {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    /// Maximum number of resident entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_age(&self) -> Option<Duration> {
        self.max_age
    }

    /// Number of resident entries. Never exceeds [`capacity`](Self::capacity).
    pub fn count(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Look up `key`, fetching and caching it on a miss if a fetch delegate is
    /// configured.
    ///
    /// Returns `Ok(None)` on a miss without a delegate. Errors from the
    /// delegate are returned as [`Error::Fetch`]. The delegate is called with
    /// no lock held, so it may use this cache itself.
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        if let Some(value) = self.try_get_value(key) {
            return Ok(Some(value));
        }
        let Some(fetcher) = self.fetcher.clone() else {
            return Ok(None);
        };

        let value = fetcher(key).map_err(Error::Fetch)?;
        self.add(key.clone(), value.clone());
        Ok(Some(value))
    }

    /// Insert or overwrite `key`, making it the most recently used entry and
    /// evicting the least recently used one if capacity is exceeded.
    pub fn add(&self, key: K, value: V) {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        self.store(&mut entries, key, value, now);
    }

    /// Non-fetching lookup. Touches recency on a hit.
    pub fn try_get_value(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let expired = match entries.peek(key) {
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Some(slot) => self.is_expired(slot, now),
        };
        if expired {
            entries.pop(key);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        self.hits.fetch_add(1, Ordering::Relaxed);
        entries.get(key).map(|slot| slot.value.clone())
    }

    /// Whether `key` is present and not expired. Does not touch recency.
    pub fn contains_key(&self, key: &K) -> bool {
        let now = Instant::now();
        self.entries
            .lock()
            .peek(key)
            .is_some_and(|slot| !self.is_expired(slot, now))
    }

    /// Atomically replace the entry for `key` with the result of `f`.
    ///
    /// `f` receives the current live value, or `None` if absent or expired.
    /// Returning `Some` stores the new value as most recently used; returning
    /// `None` leaves the cache unchanged.
    pub fn update_with<F>(&self, key: K, f: F) -> Update
    where
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let current = entries
            .peek(&key)
            .filter(|slot| !self.is_expired(slot, now))
            .map(|slot| &slot.value);

        match f(current) {
            Some(value) => Update::Stored {
                evicted: self.store(&mut entries, key, value, now),
            },
            None => Update::Unchanged,
        }
    }

    /// Remove `key`, returning its value if it was live. An expired entry is
    /// dropped but not returned.
    pub fn remove(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let slot = self.entries.lock().pop(key)?;
        (!self.is_expired(&slot, now)).then_some(slot.value)
    }

    /// Remove `key` only if it is live and `pred` holds for its value.
    pub fn remove_if<P>(&self, key: &K, pred: P) -> bool
    where
        P: FnOnce(&V) -> bool,
    {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let (expired, matches) = match entries.peek(key) {
            None => return false,
            Some(slot) if self.is_expired(slot, now) => (true, false),
            Some(slot) => (false, pred(&slot.value)),
        };
        if expired || matches {
            entries.pop(key);
        }
        matches
    }

    /// Keep only the entries for which `keep` returns true. Returns how many
    /// were removed.
    pub fn retain<P>(&self, mut keep: P) -> usize
    where
        P: FnMut(&K, &V) -> bool,
    {
        let mut entries = self.entries.lock();
        let doomed: Vec<K> = entries
            .iter()
            .filter(|(k, slot)| !keep(k, &slot.value))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        doomed.len()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// All live entries, least recently used first. Does not touch recency.
    pub fn entries(&self) -> Vec<(K, V)> {
        let now = Instant::now();
        self.entries
            .lock()
            .iter()
            .rev()
            .filter(|(_, slot)| !self.is_expired(slot, now))
            .map(|(k, slot)| (k.clone(), slot.value.clone()))
            .collect()
    }

    /// Physically drop expired entries. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        if self.max_age.is_none() {
            return 0;
        }
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let expired: Vec<K> = entries
            .iter()
            .filter(|(_, slot)| self.is_expired(slot, now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    /// Hit, miss and eviction counts.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.count() as u64,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    fn is_expired(&self, slot: &Slot<V>, now: Instant) -> bool {
        self.max_age
            .is_some_and(|age| now.saturating_duration_since(slot.inserted_at) > age)
    }

    /// Push under the caller's guard. Returns whether another entry was
    /// evicted to make room.
    fn store(&self, entries: &mut LruCache<K, Slot<V>>, key: K, value: V, now: Instant) -> bool {
        let replacing = entries.contains(&key);
        let slot = Slot {
            value,
            inserted_at: now,
        };
        // `push` hands back the old pair on overwrite, or the evicted LRU pair.
        let evicted = entries.push(key, slot).is_some() && !replacing;
        if evicted {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(capacity = self.capacity, "Evicted least recently used entry");
        }
        evicted
    }
}

impl<K, V> fmt::Debug for BoundedCache<K, V>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedCache")
            .field("capacity", &self.capacity)
            .field("max_age", &self.max_age)
            .field("entries", &self.entries.lock().len())
            .field("has_fetcher", &self.fetcher.is_some())
            .finish()
    }
}
