//! Grain directory caching and lookup.
//!
//! The authoritative directory is partitioned across members by the ring and
//! lives outside this crate. Each node keeps a [`DirectoryCache`] of answers it
//! has seen, and a [`GrainLocator`] to consult cache, ring and remote
//! directory in that order.

mod cache;
mod locator;

pub use cache::DirectoryCache;
pub use locator::{DirectoryResolver, GrainLocator};
