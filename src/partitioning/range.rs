//! Ranges of ring positions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A slot on the ring, in `[0, ring_size)`.
pub type RingPosition = u64;

/// Default number of slots on the ring (2^32).
pub const RING_SIZE: u64 = 1 << 32;

/// An arc of the ring owned by one member.
///
/// A member at position `p` whose predecessor sits at `q` owns `(q, p]`: its own
/// position is included, its predecessor's is not. The arc wraps past zero when
/// `q > p`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RingRange {
    /// Every position on the ring.
    Full,
    /// No position at all. Held by a member that shares its hash position with
    /// a member that wins the tie.
    Empty,
    /// Positions in `(begin, end]`; `begin != end`.
    Span {
        begin: RingPosition,
        end: RingPosition,
    },
}

impl RingRange {
    /// The half-open arc `(begin, end]`. Equal bounds denote the whole ring.
    pub fn span(begin: RingPosition, end: RingPosition) -> Self {
        if begin == end {
            RingRange::Full
        } else {
            RingRange::Span { begin, end }
        }
    }

    /// Whether the range covers the whole ring.
    pub fn is_full(&self) -> bool {
        matches!(self, RingRange::Full)
    }

    /// Whether the range covers no position.
    pub fn is_empty(&self) -> bool {
        matches!(self, RingRange::Empty)
    }

    /// Whether `key` falls inside the range.
    pub fn contains(&self, key: RingPosition) -> bool {
        match *self {
            RingRange::Full => true,
            RingRange::Empty => false,
            RingRange::Span { begin, end } if begin < end => begin < key && key <= end,
            RingRange::Span { begin, end } => key > begin || key <= end,
        }
    }

    /// Number of positions covered on a ring of `ring_size` slots.
    pub fn len(&self, ring_size: u64) -> u64 {
        match *self {
            RingRange::Full => ring_size,
            RingRange::Empty => 0,
            RingRange::Span { begin, end } if begin < end => end - begin,
            RingRange::Span { begin, end } => ring_size - begin + end,
        }
    }

    /// Split into non-wrapping half-open intervals `[lo, hi)` of positions.
    pub(crate) fn linear_pieces(&self, ring_size: u64) -> Vec<(u64, u64)> {
        let pieces = match *self {
            RingRange::Full => vec![(0, ring_size)],
            RingRange::Empty => Vec::new(),
            RingRange::Span { begin, end } if begin < end => vec![(begin + 1, end + 1)],
            RingRange::Span { begin, end } => vec![(begin + 1, ring_size), (0, end + 1)],
        };
        pieces.into_iter().filter(|(lo, hi)| lo < hi).collect()
    }
}

impl fmt::Display for RingRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RingRange::Full => write!(f, "<full ring>"),
            RingRange::Empty => write!(f, "<empty>"),
            RingRange::Span { begin, end } => write!(f, "({:#010x}, {:#010x}]", begin, end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_equal_bounds_is_full() {
        assert_eq!(RingRange::span(7, 7), RingRange::Full);
        assert!(RingRange::span(7, 7).is_full());
    }

    #[test]
    fn test_contains_excludes_begin_includes_end() {
        let r = RingRange::span(10, 20);
        assert!(!r.contains(10));
        assert!(r.contains(11));
        assert!(r.contains(20));
        assert!(!r.contains(21));
    }

    #[test]
    fn test_contains_wrapping() {
        let r = RingRange::span(90, 5);
        assert!(!r.contains(90));
        assert!(r.contains(91));
        assert!(r.contains(0));
        assert!(r.contains(5));
        assert!(!r.contains(6));
        assert!(!r.contains(50));
    }

    #[test]
    fn test_len() {
        assert_eq!(RingRange::span(10, 20).len(100), 10);
        assert_eq!(RingRange::span(90, 5).len(100), 15);
        assert_eq!(RingRange::Full.len(100), 100);
        assert_eq!(RingRange::Empty.len(100), 0);
    }

    #[test]
    fn test_linear_pieces() {
        assert_eq!(RingRange::span(10, 20).linear_pieces(100), vec![(11, 21)]);
        assert_eq!(
            RingRange::span(90, 5).linear_pieces(100),
            vec![(91, 100), (0, 6)]
        );
        // Arc starting at the last slot only wraps.
        assert_eq!(RingRange::span(99, 5).linear_pieces(100), vec![(0, 6)]);
        assert!(RingRange::Empty.linear_pieces(100).is_empty());
    }
}
