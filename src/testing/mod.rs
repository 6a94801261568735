//! Testing utilities for the locator.
//!
//! The consistent hash ring is only correct if nodes that never talk to each
//! other still agree. [`TestCluster`] runs one independent
//! [`RingPartitioner`](crate::partitioning::RingPartitioner) per simulated node
//! and lets tests feed them joins and failures the way a membership protocol
//! would, then check two things:
//!
//! - every node maps a key to the same owner, and that owner follows the
//!   successor rule;
//! - the ranges the nodes claim for themselves tile the ring exactly once.
//!
//! ```text
//!   TestCluster
//!   ┌───────────────┬───────────────┬───────────────┐
//!   │ ring @ node 1 │ ring @ node 2 │ ring @ node 3 │   independent views
//!   └───────┬───────┴───────┬───────┴───────┬───────┘
//!           │ get_my_range  │               │
//!           ▼               ▼               ▼
//!   ┌─────────────────────────────────────────────────┐
//!   │ RangeSet: claim each range, expect zero left    │
//!   └─────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use grain_locator::testing::TestCluster;
//!
//! let mut cluster = TestCluster::new(5).unwrap();
//! cluster.connect_all();
//! cluster.verify_ring();
//!
//! let sorted = cluster.members_by_position();
//! cluster.remove_servers(&sorted[..2]);
//! cluster.verify_ring();
//! cluster.verify_boundaries();
//! ```

mod cluster;

#[cfg(test)]
mod locator_tests;

pub use cluster::TestCluster;

/// Route `tracing` output through the test harness. Set `RUST_LOG` to see it.
#[cfg(test)]
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
