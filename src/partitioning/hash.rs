//! The ring hash function.
//!
//! Every member of a cluster must map identities onto the ring with exactly
//! the same function, bit for bit. The function is xxHash64 with seed 0 over an
//! explicit byte encoding (see [`MemberId::to_hash_bytes`]), never through
//! `std::hash::Hash`, whose slice length prefix is platform dependent.
//!
//! Changing anything here requires bumping [`RING_HASH_VERSION`] and a
//! coordinated cluster-wide migration.
//!
//! [`MemberId::to_hash_bytes`]: crate::types::MemberId::to_hash_bytes

use super::RingPosition;
use std::hash::Hasher;
use twox_hash::XxHash64;

/// Version of the ring hash contract.
pub const RING_HASH_VERSION: u32 = 1;

/// Seed used for every ring hash.
pub const RING_HASH_SEED: u64 = 0;

/// Hash raw bytes with the ring hash.
pub fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(RING_HASH_SEED);
    hasher.write(bytes);
    hasher.finish()
}

/// Map a 64-bit hash onto a ring of `ring_size` slots.
///
/// `ring_size` must be positive; configuration validation guarantees this for
/// every ring built through [`RingConfig`](crate::config::RingConfig).
pub fn reduce(hash: u64, ring_size: u64) -> RingPosition {
    debug_assert!(ring_size > 0, "ring size must be positive");
    hash % ring_size.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_vectors() {
        // Published xxHash64 vectors; a mismatch means the ring layout changed.
        assert_eq!(hash_bytes(b""), 0xEF46_DB37_51D8_E999);
        assert_eq!(hash_bytes(b"abc"), 0x44BC_2CF5_AD77_0999);
    }

    #[test]
    fn test_reduce() {
        assert_eq!(reduce(25, 10), 5);
        assert_eq!(reduce(u64::MAX, u64::MAX), 0);
        assert!(reduce(hash_bytes(b"member"), 1 << 32) < 1 << 32);
    }
}
