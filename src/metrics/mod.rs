//! Metrics for the ring and the directory cache.
//!
//! Components never touch a global registry. Each [`RingPartitioner`] and
//! [`DirectoryCache`] receives an `Arc<dyn MetricsSink>` at construction, so
//! test instances stay isolated and several nodes can live in one process.
//!
//! ```text
//! ┌────────────────┐   events    ┌──────────────────────────┐
//! │ RingPartitioner│────────────▶│                          │
//! └────────────────┘             │  dyn MetricsSink         │
//! ┌────────────────┐   events    │   ├─ LocatorMetrics      │
//! │ DirectoryCache │────────────▶│   └─ NoopMetrics         │
//! └────────────────┘             └──────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use grain_locator::metrics::{LocatorMetrics, MetricsSink};
//! use std::sync::Arc;
//!
//! let metrics = Arc::new(LocatorMetrics::new());
//! metrics.directory_lookup(true);
//! metrics.directory_lookup(false);
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.lookup_hit_rate(), 0.5);
//! ```
//!
//! [`RingPartitioner`]: crate::partitioning::RingPartitioner
//! [`DirectoryCache`]: crate::directory::DirectoryCache

mod counters;
mod gauges;

pub use counters::{Counter, LabeledCounter};
pub use gauges::Gauge;

use std::sync::Arc;

/// Receiver of locator events.
///
/// Every hook has an empty default body so sinks only implement what they
/// care about.
pub trait MetricsSink: Send + Sync + std::fmt::Debug {
    /// A member was inserted into the ring.
    fn ring_member_added(&self) {}

    /// A member was removed from the ring.
    fn ring_member_removed(&self) {}

    /// The ring now holds `members` members.
    fn ring_members(&self, _members: usize) {}

    /// The local member's owned range changed.
    fn ring_range_changed(&self) {}

    /// A directory cache lookup completed.
    fn directory_lookup(&self, _hit: bool) {}

    /// A directory cache update was applied, or rejected as stale.
    fn directory_update(&self, _applied: bool) {}

    /// Entries were removed from the directory cache for `reason`.
    fn directory_removal(&self, _reason: &str, _count: u64) {}

    /// The directory cache now holds `entries` entries.
    fn directory_entries(&self, _entries: usize) {}
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {}

impl NoopMetrics {
    /// Shared no-op sink.
    pub fn shared() -> Arc<dyn MetricsSink> {
        Arc::new(NoopMetrics)
    }
}

/// Counter-backed sink covering ring and directory events.
#[derive(Debug)]
pub struct LocatorMetrics {
    /// Members inserted into the ring.
    pub ring_adds: Counter,
    /// Members removed from the ring.
    pub ring_removes: Counter,
    /// Current ring member count.
    pub ring_member_count: Gauge,
    /// Local range changes.
    pub ring_range_changes: Counter,

    /// Directory cache lookups that hit.
    pub lookup_hits: Counter,
    /// Directory cache lookups that missed.
    pub lookup_misses: Counter,
    /// Directory updates applied.
    pub updates_applied: Counter,
    /// Directory updates rejected as stale.
    pub updates_stale: Counter,
    /// Removed directory entries by reason.
    pub removals: LabeledCounter<1>,
    /// Current directory cache entry count.
    pub directory_entry_count: Gauge,
}

impl LocatorMetrics {
    /// Create a sink with every value at zero.
    pub fn new() -> Self {
        Self {
            ring_adds: Counter::new("ring_member_adds_total", "Members inserted into the ring"),
            ring_removes: Counter::new("ring_member_removes_total", "Members removed from the ring"),
            ring_member_count: Gauge::new("ring_members", "Members currently on the ring"),
            ring_range_changes: Counter::new(
                "ring_range_changes_total",
                "Changes of the local member's owned range",
            ),
            lookup_hits: Counter::new("directory_cache_hits_total", "Directory cache lookup hits"),
            lookup_misses: Counter::new(
                "directory_cache_misses_total",
                "Directory cache lookup misses",
            ),
            updates_applied: Counter::new(
                "directory_cache_updates_total",
                "Directory cache updates applied",
            ),
            updates_stale: Counter::new(
                "directory_cache_stale_updates_total",
                "Directory cache updates rejected as stale",
            ),
            removals: LabeledCounter::new(
                "directory_cache_removals_total",
                "Directory cache entries removed",
                ["reason"],
            ),
            directory_entry_count: Gauge::new(
                "directory_cache_entries",
                "Directory cache resident entries",
            ),
        }
    }

    /// Point-in-time copy of the headline values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ring_adds: self.ring_adds.get(),
            ring_removes: self.ring_removes.get(),
            ring_members: self.ring_member_count.get(),
            ring_range_changes: self.ring_range_changes.get(),
            lookup_hits: self.lookup_hits.get(),
            lookup_misses: self.lookup_misses.get(),
            updates_applied: self.updates_applied.get(),
            updates_stale: self.updates_stale.get(),
            directory_entries: self.directory_entry_count.get(),
        }
    }

    /// Render every value in Prometheus text exposition format.
    pub fn to_prometheus(&self) -> String {
        let mut out = String::new();

        for counter in [
            &self.ring_adds,
            &self.ring_removes,
            &self.ring_range_changes,
            &self.lookup_hits,
            &self.lookup_misses,
            &self.updates_applied,
            &self.updates_stale,
        ] {
            counter.render(&mut out);
        }
        self.ring_member_count.render(&mut out);
        self.directory_entry_count.render(&mut out);
        self.removals.render(&mut out);

        out
    }
}

impl Default for LocatorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSink for LocatorMetrics {
    fn ring_member_added(&self) {
        self.ring_adds.inc();
    }

    fn ring_member_removed(&self) {
        self.ring_removes.inc();
    }

    fn ring_members(&self, members: usize) {
        self.ring_member_count.set(members as i64);
    }

    fn ring_range_changed(&self) {
        self.ring_range_changes.inc();
    }

    fn directory_lookup(&self, hit: bool) {
        if hit {
            self.lookup_hits.inc();
        } else {
            self.lookup_misses.inc();
        }
    }

    fn directory_update(&self, applied: bool) {
        if applied {
            self.updates_applied.inc();
        } else {
            self.updates_stale.inc();
        }
    }

    fn directory_removal(&self, reason: &str, count: u64) {
        self.removals.add([reason], count);
    }

    fn directory_entries(&self, entries: usize) {
        self.directory_entry_count.set(entries as i64);
    }
}

/// Snapshot of [`LocatorMetrics`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub ring_adds: u64,
    pub ring_removes: u64,
    pub ring_members: i64,
    pub ring_range_changes: u64,
    pub lookup_hits: u64,
    pub lookup_misses: u64,
    pub updates_applied: u64,
    pub updates_stale: u64,
    pub directory_entries: i64,
}

impl MetricsSnapshot {
    /// Fraction of directory lookups that hit the cache.
    pub fn lookup_hit_rate(&self) -> f64 {
        let total = self.lookup_hits + self.lookup_misses;
        if total == 0 {
            0.0
        } else {
            self.lookup_hits as f64 / total as f64
        }
    }
}
