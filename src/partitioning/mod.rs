//! Consistent-hash partitioning of the ring key space across cluster members.
//!
//! Every member sits at one position on a fixed-size ring, derived from the
//! versioned ring hash of its identity. A key belongs to the first member at or
//! after it, clockwise:
//!
//! ```text
//!              0
//!          ┌───●───┐          member A owns (D, A]
//!        D ●       ● A        member B owns (A, B]
//!          │  ring │          ...
//!        C ●       ● B        key k in (A, B]  →  B
//!          └───────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use grain_locator::partitioning::{verify_coverage, RingPartitioner};
//! use grain_locator::MemberId;
//!
//! let members: Vec<MemberId> = (1..=3).map(|i| MemberId::local(11110 + i, 1)).collect();
//! let rings: Vec<RingPartitioner> =
//!     members.iter().map(|m| RingPartitioner::for_member(*m)).collect();
//!
//! // Tell every ring about every member.
//! for ring in &rings {
//!     for m in &members {
//!         ring.add_server(*m);
//!     }
//! }
//!
//! // All views agree on the owner of a key...
//! let owner = rings[0].get_primary_target(42);
//! assert!(rings.iter().all(|r| r.get_primary_target(42) == owner));
//!
//! // ...and the local ranges tile the ring exactly once.
//! let ring_size = rings[0].ring_size();
//! verify_coverage(ring_size, rings.iter().map(|r| r.get_my_range())).unwrap();
//! ```

pub mod hash;
mod hashring;
mod partitioner;
mod range;
mod range_set;

pub use hash::RING_HASH_VERSION;
pub use hashring::HashRing;
pub use partitioner::{RingPartitioner, RingRangeListener};
pub use range::{RingPosition, RingRange, RING_SIZE};
pub use range_set::{verify_coverage, RangeSet};
