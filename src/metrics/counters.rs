//! Monotonic counters, plain and labeled.
//!
//! Each counter renders its own Prometheus exposition block, so
//! [`LocatorMetrics`](super::LocatorMetrics) only has to list them.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// A single monotonically increasing value.
#[derive(Debug)]
pub struct Counter {
    name: &'static str,
    help: &'static str,
    value: AtomicU64,
}

impl Counter {
    pub const fn new(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            value: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn inc(&self) {
        self.add(1);
    }

    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Append the `HELP`, `TYPE` and sample lines to `out`.
    pub fn render(&self, out: &mut String) {
        let _ = writeln!(out, "# HELP {} {}", self.name, self.help);
        let _ = writeln!(out, "# TYPE {} counter", self.name);
        let _ = writeln!(out, "{} {}", self.name, self.get());
    }
}

/// Counters sharing one name, with one series per distinct tuple of `N`
/// label values.
///
/// Series appear on first increment and are kept ordered by label values.
/// Increments are rare next to lookups, so a plain mutex over the series map
/// is enough.
#[derive(Debug)]
pub struct LabeledCounter<const N: usize> {
    name: &'static str,
    help: &'static str,
    labels: [&'static str; N],
    series: Mutex<BTreeMap<[String; N], u64>>,
}

impl<const N: usize> LabeledCounter<N> {
    pub fn new(name: &'static str, help: &'static str, labels: [&'static str; N]) -> Self {
        Self {
            name,
            help,
            labels,
            series: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn inc(&self, values: [&str; N]) {
        self.add(values, 1);
    }

    pub fn add(&self, values: [&str; N], n: u64) {
        *self
            .series
            .lock()
            .entry(values.map(str::to_owned))
            .or_insert(0) += n;
    }

    /// Value of one series; zero if it never existed.
    pub fn get(&self, values: [&str; N]) -> u64 {
        self.series
            .lock()
            .iter()
            .find(|(key, _)| key.iter().zip(values).all(|(have, want)| have == want))
            .map_or(0, |(_, count)| *count)
    }

    /// Every series with its value, ordered by label values.
    pub fn series(&self) -> Vec<([String; N], u64)> {
        self.series
            .lock()
            .iter()
            .map(|(key, count)| (key.clone(), *count))
            .collect()
    }

    /// Append the `HELP` and `TYPE` lines and one sample line per series.
    pub fn render(&self, out: &mut String) {
        let _ = writeln!(out, "# HELP {} {}", self.name, self.help);
        let _ = writeln!(out, "# TYPE {} counter", self.name);
        for (values, count) in self.series() {
            let pairs: Vec<String> = self
                .labels
                .iter()
                .zip(&values)
                .map(|(label, value)| format!("{label}=\"{value}\""))
                .collect();
            let _ = writeln!(out, "{}{{{}}} {}", self.name, pairs.join(","), count);
        }
    }
}
