//! Gauges for values that move both ways.

use std::fmt::Write;
use std::sync::atomic::{AtomicI64, Ordering};

/// A gauge holding the last observed value.
#[derive(Debug)]
pub struct Gauge {
    name: &'static str,
    help: &'static str,
    value: AtomicI64,
}

impl Gauge {
    /// Create a new gauge at zero.
    pub const fn new(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            value: AtomicI64::new(0),
        }
    }

    /// Metric name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Metric help text.
    pub fn help(&self) -> &'static str {
        self.help
    }

    /// Overwrite the value.
    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
    }

    /// Add to the value (negative to subtract).
    pub fn add(&self, n: i64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    /// Current value.
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Append the `HELP`, `TYPE` and sample lines to `out`.
    pub fn render(&self, out: &mut String) {
        let _ = writeln!(out, "# HELP {} {}", self.name, self.help);
        let _ = writeln!(out, "# TYPE {} gauge", self.name);
        let _ = writeln!(out, "{} {}", self.name, self.get());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gauge() {
        let gauge = Gauge::new("ring_members", "Members on the ring");
        assert_eq!(gauge.get(), 0);

        gauge.set(5);
        gauge.add(2);
        gauge.add(-3);
        assert_eq!(gauge.get(), 4);
    }
}
