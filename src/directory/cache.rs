//! Versioned cache of grain locations.
//!
//! Location updates reach a node out of order, so every entry carries the
//! version its writer assigned. An update is applied only when its version is
//! at least the cached one; anything older is dropped on the floor. The version
//! check and the write happen inside the underlying cache's critical section.

use crate::cache::{BoundedCache, Update};
use crate::config::DirectoryCacheConfig;
use crate::error::Result;
use crate::metrics::MetricsSink;
use crate::types::{ActivationAddress, CacheStats, DirectoryEntry, GrainId, MemberId};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Local, bounded memo of grain locations.
pub struct DirectoryCache {
    entries: BoundedCache<GrainId, DirectoryEntry>,
    metrics: Arc<dyn MetricsSink>,
}

impl DirectoryCache {
    /// Create an empty cache.
    pub fn new(config: DirectoryCacheConfig, metrics: Arc<dyn MetricsSink>) -> Result<Self> {
        config.validate()?;

        let mut entries = BoundedCache::new(config.max_capacity);
        if let Some(max_age) = config.max_age {
            entries = entries.with_max_age(max_age);
        }

        debug!(
            capacity = config.max_capacity,
            max_age = ?config.max_age,
            "Created directory cache"
        );

        Ok(Self { entries, metrics })
    }

    /// Record that `address.grain` lives at `address` as of `version`.
    ///
    /// Applied when the grain is absent or `version` is at least the cached
    /// version. Returns whether the update was applied. Making room for a new
    /// grain may evict the least recently used one, which is reported as an
    /// `evicted` removal.
    pub fn add_or_update(&self, address: ActivationAddress, version: u64) -> bool {
        let grain = address.grain.clone();
        let mut cached_version = None;

        let outcome = self.entries.update_with(grain.clone(), |current| match current {
            Some(existing) if version < existing.version => {
                cached_version = Some(existing.version);
                None
            }
            _ => Some(DirectoryEntry::new(address, version)),
        });

        let applied = outcome.is_stored();
        if outcome == (Update::Stored { evicted: true }) {
            self.metrics.directory_removal("evicted", 1);
        }
        if !applied {
            trace!(
                grain = %grain,
                version,
                cached = ?cached_version,
                "Ignoring stale directory update"
            );
        }
        self.metrics.directory_update(applied);
        self.metrics.directory_entries(self.entries.count());
        applied
    }

    /// The cached entry for `grain`, if resident.
    pub fn lookup(&self, grain: &GrainId) -> Option<DirectoryEntry> {
        let entry = self.entries.try_get_value(grain);
        self.metrics.directory_lookup(entry.is_some());
        entry
    }

    /// Like [`lookup`](Self::lookup), but an entry whose address fails
    /// `is_valid` is removed and reported as a miss.
    pub fn lookup_valid<F>(&self, grain: &GrainId, is_valid: F) -> Option<DirectoryEntry>
    where
        F: Fn(&ActivationAddress) -> bool,
    {
        let entry = self.lookup(grain)?;
        if is_valid(&entry.address) {
            return Some(entry);
        }

        if self.entries.remove_if(grain, |cached| cached.address == entry.address) {
            debug!(grain = %grain, address = %entry.address, "Dropped invalid directory entry");
            self.record_removal("invalid", 1);
        }
        None
    }

    /// Whether `grain` has a live entry. Does not count as a lookup.
    pub fn contains_key(&self, grain: &GrainId) -> bool {
        self.entries.contains_key(grain)
    }

    /// Remove the entry for `grain`. Returns whether one existed.
    pub fn remove(&self, grain: &GrainId) -> bool {
        let removed = self.entries.remove(grain).is_some();
        if removed {
            self.record_removal("explicit", 1);
        }
        removed
    }

    /// Remove the entry for `address.grain` only if it still points at
    /// `address`. A newer location for the same grain is left alone.
    pub fn remove_address(&self, address: &ActivationAddress) -> bool {
        let removed = self
            .entries
            .remove_if(&address.grain, |cached| cached.address == *address);
        if removed {
            self.record_removal("explicit", 1);
        }
        removed
    }

    /// Drop every entry hosted on `member`. Returns how many were dropped.
    pub fn remove_member(&self, member: &MemberId) -> usize {
        let removed = self
            .entries
            .retain(|_, entry| entry.address.member != *member);
        if removed > 0 {
            debug!(member = %member, removed, "Dropped directory entries hosted on member");
            self.record_removal("member", removed);
        }
        removed
    }

    /// Drop every entry whose grain matches `pred`. Used when the directory
    /// partition covering those grains moves. Returns how many were dropped.
    pub fn remove_grains_where<P>(&self, mut pred: P) -> usize
    where
        P: FnMut(&GrainId) -> bool,
    {
        let removed = self.entries.retain(|grain, _| !pred(grain));
        if removed > 0 {
            self.record_removal("ownership", removed);
        }
        removed
    }

    /// Drop all entries.
    pub fn clear(&self) {
        let dropped = self.entries.count();
        self.entries.clear();
        debug!(dropped, "Cleared directory cache");
        self.record_removal("clear", dropped);
    }

    /// Every live entry, least recently used first.
    pub fn key_values(&self) -> Vec<DirectoryEntry> {
        self.entries
            .entries()
            .into_iter()
            .map(|(_, entry)| entry)
            .collect()
    }

    /// Number of resident entries.
    pub fn count(&self) -> usize {
        self.entries.count()
    }

    /// Whether no entry is resident.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of resident entries.
    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    /// Hit, miss and eviction counts of the underlying LRU.
    pub fn stats(&self) -> CacheStats {
        self.entries.stats()
    }

    fn record_removal(&self, reason: &str, count: usize) {
        self.metrics.directory_removal(reason, count as u64);
        self.metrics.directory_entries(self.entries.count());
    }
}

impl fmt::Debug for DirectoryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryCache")
            .field("entries", &self.entries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{LocatorMetrics, NoopMetrics};
    use crate::types::ActivationId;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    use std::thread;
    use std::time::Duration;

    fn cache(capacity: usize) -> DirectoryCache {
        DirectoryCache::new(DirectoryCacheConfig::new(capacity), NoopMetrics::shared()).unwrap()
    }

    fn address(grain: &str, port: u16) -> ActivationAddress {
        ActivationAddress::new(GrainId::from(grain), MemberId::local(port, 1), ActivationId::new())
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = DirectoryCache::new(DirectoryCacheConfig::new(0), NoopMetrics::shared());
        assert!(result.is_err());
    }

    #[test]
    fn test_stale_update_rejected() {
        let cache = cache(16);
        let addr_a = address("grainX", 11111);
        let addr_b = address("grainX", 22222);

        assert!(cache.add_or_update(addr_a.clone(), 5));
        assert!(!cache.add_or_update(addr_b, 3));

        let entry = cache.lookup(&GrainId::from("grainX")).unwrap();
        assert_eq!(entry.address, addr_a);
        assert_eq!(entry.version, 5);
    }

    #[test]
    fn test_newer_update_overwrites() {
        let cache = cache(16);
        let addr_b = address("grainX", 22222);

        cache.add_or_update(address("grainX", 11111), 5);
        assert!(cache.add_or_update(addr_b.clone(), 6));

        let entry = cache.lookup(&GrainId::from("grainX")).unwrap();
        assert_eq!(entry, DirectoryEntry::new(addr_b, 6));
    }

    #[test]
    fn test_equal_version_is_idempotent() {
        let cache = cache(16);
        let addr = address("grainX", 11111);

        assert!(cache.add_or_update(addr.clone(), 5));
        assert!(cache.add_or_update(addr.clone(), 5));

        assert_eq!(cache.count(), 1);
        assert_eq!(cache.key_values(), vec![DirectoryEntry::new(addr, 5)]);
    }

    #[test]
    fn test_out_of_order_updates_keep_max_version() {
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for _ in 0..20 {
            let cache = cache(16);
            let mut updates: Vec<(u64, ActivationAddress)> = (1..=12)
                .map(|v| (v, address("grainY", 10000 + v as u16)))
                .collect();
            updates.shuffle(&mut rng);

            for (version, addr) in &updates {
                cache.add_or_update(addr.clone(), *version);
            }

            let entry = cache.lookup(&GrainId::from("grainY")).unwrap();
            assert_eq!(entry.version, 12);
            assert_eq!(entry.address.member, MemberId::local(10012, 1));
        }
    }

    #[test]
    fn test_remove_by_grain() {
        let cache = cache(16);
        cache.add_or_update(address("a", 11111), 1);

        assert!(cache.remove(&GrainId::from("a")));
        assert!(!cache.remove(&GrainId::from("a")));
        assert!(cache.lookup(&GrainId::from("a")).is_none());
    }

    #[test]
    fn test_remove_stale_address_keeps_newer_entry() {
        let cache = cache(16);
        let old = address("a", 11111);
        let new = address("a", 22222);

        cache.add_or_update(old.clone(), 1);
        cache.add_or_update(new.clone(), 2);

        assert!(!cache.remove_address(&old));
        assert_eq!(cache.lookup(&GrainId::from("a")).unwrap().address, new);
        assert!(cache.remove_address(&new));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_remove_member() {
        let cache = cache(16);
        for (grain, port) in [("a", 11111), ("b", 22222), ("c", 11111), ("d", 33333)] {
            cache.add_or_update(address(grain, port), 1);
        }

        assert_eq!(cache.remove_member(&MemberId::local(11111, 1)), 2);
        assert_eq!(cache.count(), 2);
        assert!(!cache.contains_key(&GrainId::from("a")));
        assert!(cache.contains_key(&GrainId::from("b")));
    }

    #[test]
    fn test_lookup_valid_drops_invalid_entry() {
        let cache = cache(16);
        let dead = MemberId::local(11111, 1);
        cache.add_or_update(address("a", 11111), 1);
        cache.add_or_update(address("b", 22222), 1);

        assert!(cache
            .lookup_valid(&GrainId::from("a"), |addr| addr.member != dead)
            .is_none());
        assert!(!cache.contains_key(&GrainId::from("a")));
        assert!(cache
            .lookup_valid(&GrainId::from("b"), |addr| addr.member != dead)
            .is_some());
    }

    #[test]
    fn test_capacity_bound() {
        let cache = cache(3);
        for (i, grain) in ["a", "b", "c", "d"].into_iter().enumerate() {
            cache.add_or_update(address(grain, 11111), i as u64);
        }

        assert_eq!(cache.count(), 3);
        assert!(!cache.contains_key(&GrainId::from("a")));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_clear() {
        let cache = cache(16);
        cache.add_or_update(address("a", 11111), 1);
        cache.add_or_update(address("b", 11111), 1);

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.key_values().is_empty());
    }

    #[test]
    fn test_metrics_are_reported() {
        let metrics = Arc::new(LocatorMetrics::new());
        let cache = DirectoryCache::new(DirectoryCacheConfig::new(16), metrics.clone()).unwrap();

        cache.add_or_update(address("a", 11111), 5);
        cache.add_or_update(address("a", 22222), 4);
        cache.lookup(&GrainId::from("a"));
        cache.lookup(&GrainId::from("missing"));
        cache.remove_member(&MemberId::local(11111, 1));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.updates_applied, 1);
        assert_eq!(snapshot.updates_stale, 1);
        assert_eq!(snapshot.lookup_hits, 1);
        assert_eq!(snapshot.lookup_misses, 1);
        assert_eq!(snapshot.directory_entries, 0);
        assert_eq!(metrics.removals.get(["member"]), 1);
    }

    #[test]
    fn test_eviction_is_reported() {
        let metrics = Arc::new(LocatorMetrics::new());
        let cache = DirectoryCache::new(DirectoryCacheConfig::new(2), metrics.clone()).unwrap();

        cache.add_or_update(address("a", 11111), 1);
        cache.add_or_update(address("b", 11111), 1);
        cache.add_or_update(address("b", 11111), 2);
        assert_eq!(metrics.removals.get(["evicted"]), 0);

        cache.add_or_update(address("c", 11111), 1);
        assert_eq!(metrics.removals.get(["evicted"]), 1);
        assert_eq!(metrics.snapshot().directory_entries, 2);
        assert!(metrics
            .to_prometheus()
            .contains("directory_cache_removals_total{reason=\"evicted\"} 1"));
    }

    #[test]
    fn test_expired_entry_is_not_removed_explicitly() {
        let metrics = Arc::new(LocatorMetrics::new());
        let config = DirectoryCacheConfig::new(16).with_max_age(Duration::from_millis(20));
        let cache = DirectoryCache::new(config, metrics.clone()).unwrap();
        let addr = address("a", 11111);
        cache.add_or_update(addr.clone(), 1);
        cache.add_or_update(address("b", 11111), 1);
        thread::sleep(Duration::from_millis(40));

        assert!(!cache.remove(&GrainId::from("a")));
        assert!(!cache.remove_address(&address("b", 11111)));
        assert!(!cache.remove_address(&addr));
        assert_eq!(metrics.removals.get(["explicit"]), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_updates_converge_to_max_version() {
        let cache = cache(64);
        let grain = GrainId::from("hot");

        thread::scope(|s| {
            for t in 0..8u64 {
                let cache = &cache;
                let grain = grain.clone();
                s.spawn(move || {
                    for v in (t..400).step_by(8) {
                        let addr = ActivationAddress::new(
                            grain.clone(),
                            MemberId::local(10000 + v as u16, 1),
                            ActivationId::new(),
                        );
                        cache.add_or_update(addr, v);
                    }
                });
            }
        });

        let entry = cache.lookup(&grain).unwrap();
        assert_eq!(entry.version, 399);
        assert_eq!(entry.address.member, MemberId::local(10399, 1));
    }
}
