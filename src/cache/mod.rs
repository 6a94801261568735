//! Local, in-memory caching primitives.
//!
//! [`BoundedCache`] is the generic building block: a strict LRU with an
//! optional maximum entry age and an optional fetch delegate for misses. The
//! directory cache layers version-based conflict resolution on top of it.

mod bounded;

pub use bounded::{BoundedCache, FetchFn, Update};
