//! Grain location resolution for a virtual-actor runtime.
//!
//! This crate answers two questions for every node of a cluster:
//!
//! - **Which member owns the directory partition for a key?** A consistent
//!   hash ring maps every member to a position and every key to the first
//!   member at or after it, so nodes agree on ownership without coordination.
//! - **Where does a grain currently live?** A bounded, versioned cache
//!   remembers recent answers from the directory and ignores updates that
//!   arrive out of order.
//!
//! # Example
//!
//! ```rust
//! use grain_locator::{
//!     ActivationAddress, ActivationId, DirectoryCache, DirectoryCacheConfig, GrainId,
//!     MemberId, NoopMetrics, RingPartitioner,
//! };
//!
//! let local = MemberId::local(11111, 1);
//! let ring = RingPartitioner::for_member(local);
//! ring.add_server(MemberId::local(22222, 1));
//!
//! let grain = GrainId::from("user/42");
//! let owner = ring.get_primary_target_for_grain(&grain);
//! assert!(ring.contains(&owner));
//!
//! let cache = DirectoryCache::new(DirectoryCacheConfig::new(1024), NoopMetrics::shared())?;
//! let address = ActivationAddress::new(grain.clone(), owner, ActivationId::new());
//! assert!(cache.add_or_update(address.clone(), 7));
//! assert!(!cache.add_or_update(address, 3));
//! assert_eq!(cache.lookup(&grain).map(|e| e.version), Some(7));
//! # Ok::<(), grain_locator::Error>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//!   membership events              directory push notifications
//!          │                                   │
//!          ▼                                   ▼
//! ┌─────────────────┐   owner of grain   ┌─────────────────┐
//! │ RingPartitioner │◄───────────────────│  GrainLocator   │
//! │  RwLock<ring>   │                    │                 │
//! └─────────────────┘                    └────────┬────────┘
//!                                                 │
//!                              ┌──────────────────┼──────────────────┐
//!                              ▼                                     ▼
//!                     ┌─────────────────┐                  ┌───────────────────┐
//!                     │ DirectoryCache  │                  │ DirectoryResolver │
//!                     │ (BoundedCache)  │                  │ (remote query)    │
//!                     └─────────────────┘                  └───────────────────┘
//! ```
//!
//! # Consistency Model
//!
//! - Nodes with the same membership view compute the same owner for every key.
//! - Cached locations are monotonic per grain: a lower version never replaces
//!   a higher one.
//! - Nothing else is coordinated across nodes; the system is eventually
//!   consistent.

pub mod cache;
pub mod cluster;
pub mod config;
pub mod directory;
pub mod error;
pub mod metrics;
pub mod partitioning;
pub mod testing;
pub mod types;

// Re-export main types for convenience
pub use cache::{BoundedCache, Update};
pub use config::{DirectoryCacheConfig, LocatorConfig, RingConfig};
pub use directory::{DirectoryCache, DirectoryResolver, GrainLocator};
pub use error::{Error, Result};
pub use types::{
    ActivationAddress, ActivationId, CacheStats, DirectoryEntry, GrainId, MemberId,
};

pub use cluster::MemberEvent;

// Re-export partitioning types
pub use partitioning::{
    verify_coverage, HashRing, RangeSet, RingPartitioner, RingPosition, RingRange,
    RingRangeListener, RING_SIZE,
};

// Re-export metrics types
pub use metrics::{
    Counter, Gauge, LabeledCounter, LocatorMetrics, MetricsSink, MetricsSnapshot, NoopMetrics,
};

pub use testing::TestCluster;
