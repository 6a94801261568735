//! Exact-coverage oracle for ring ranges.
//!
//! A [`RangeSet`] starts out as the whole ring, unclaimed. Every range a member
//! reports is carved out of it; carving out anything already carved means two
//! members claim the same key. Once every live member has reported, zero
//! remaining ranges proves the ring is tiled exactly once.

use super::range::RingRange;
use crate::error::{CoverageError, Result};
use std::collections::BTreeMap;
use std::fmt;

/// The unclaimed part of the ring, as disjoint intervals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSet {
    ring_size: u64,

    /// Free intervals `[lo, hi)` keyed by `lo`. Never adjacent to each other.
    free: BTreeMap<u64, u64>,
}

impl RangeSet {
    /// A set covering the whole ring of `ring_size` slots.
    pub fn new(ring_size: u64) -> Self {
        let mut free = BTreeMap::new();
        if ring_size > 0 {
            free.insert(0, ring_size);
        }
        Self { ring_size, free }
    }

    /// Claim `range`. Returns `false`, leaving the set untouched, if any part of
    /// it was claimed before.
    pub fn remove(&mut self, range: &RingRange) -> bool {
        let pieces = range.linear_pieces(self.ring_size);

        let mut hosts = Vec::with_capacity(pieces.len());
        for &(lo, hi) in &pieces {
            match self.free.range(..=lo).next_back() {
                Some((&start, &end)) if hi <= end => hosts.push((start, end)),
                _ => return false,
            }
        }
        // Both pieces of a wrapping range only share a free interval when it spans
        // the whole ring, so the interval end is re-read on every split.
        for ((lo, hi), (start, end)) in pieces.into_iter().zip(hosts) {
            let end = self.free.remove(&start).unwrap_or(end);
            if start < lo {
                self.free.insert(start, lo);
            }
            if hi < end {
                self.free.insert(hi, end);
            }
        }
        true
    }

    /// Number of unclaimed arcs. A free arc crossing zero counts once.
    pub fn num_ranges(&self) -> usize {
        let n = self.free.len();
        if n > 1 && self.wraps() {
            n - 1
        } else {
            n
        }
    }

    /// Whether every position has been claimed.
    pub fn is_covered(&self) -> bool {
        self.free.is_empty()
    }

    /// The unclaimed arcs, as ring ranges.
    pub fn uncovered(&self) -> Vec<RingRange> {
        if self.free.len() == 1 && self.wraps() {
            return vec![RingRange::Full];
        }

        let mut intervals: Vec<(u64, u64)> = self.free.iter().map(|(&lo, &hi)| (lo, hi)).collect();
        if intervals.len() > 1 && self.wraps() {
            // Fuse the tail arc with the head arc across zero.
            let (_, head_hi) = intervals.remove(0);
            if let Some(last) = intervals.last_mut() {
                last.1 = head_hi;
            }
        }

        intervals
            .into_iter()
            .map(|(lo, hi)| {
                // Positions [lo, hi) are the arc (lo - 1, hi - 1].
                let begin = lo.checked_sub(1).unwrap_or(self.ring_size - 1);
                RingRange::span(begin, hi - 1)
            })
            .collect()
    }

    /// Whether free space touches both ends of the linear key space.
    fn wraps(&self) -> bool {
        let starts_at_zero = self.free.contains_key(&0);
        let ends_at_top = self
            .free
            .iter()
            .next_back()
            .is_some_and(|(_, &hi)| hi == self.ring_size);
        starts_at_zero && ends_at_top
    }
}

impl fmt::Display for RangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let uncovered: Vec<String> = self.uncovered().iter().map(ToString::to_string).collect();
        write!(f, "[{}]", uncovered.join(", "))
    }
}

/// Check that `ranges` tile a ring of `ring_size` slots exactly once.
pub fn verify_coverage<I>(ring_size: u64, ranges: I) -> Result<()>
where
    I: IntoIterator<Item = RingRange>,
{
    let mut set = RangeSet::new(ring_size);
    for range in ranges {
        if !set.remove(&range) {
            return Err(CoverageError::Overlap {
                range: range.to_string(),
            }
            .into());
        }
    }
    if !set.is_covered() {
        return Err(CoverageError::Gap {
            count: set.num_ranges(),
            uncovered: set.to_string(),
        }
        .into());
    }
    Ok(())
}
