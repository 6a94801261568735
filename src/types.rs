//! Core types used throughout the locator.

use crate::partitioning::{hash, RingPosition};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use uuid::Uuid;

/// Identity of a cluster member.
///
/// Two members are equal when both the endpoint and the generation match, so a
/// restarted process on the same endpoint is a different member. The derived
/// ordering compares the raw address bytes first and is used to break ties when
/// two members hash onto the same ring position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemberId {
    /// Endpoint the member is reachable on.
    pub addr: SocketAddr,
    /// Incarnation number, bumped on every restart.
    pub generation: u32,
}

impl MemberId {
    /// Create a new member identity.
    pub fn new(addr: SocketAddr, generation: u32) -> Self {
        Self { addr, generation }
    }

    /// Loopback member on the given port, handy for tests and single-node setups.
    pub fn local(port: u16, generation: u32) -> Self {
        Self::new(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), port), generation)
    }

    /// Canonical byte encoding fed into the ring hash.
    ///
    /// Layout: address family tag, IP octets, port (big endian), generation
    /// (big endian). This encoding is part of the ring hash contract and must not
    /// change without bumping [`hash::RING_HASH_VERSION`].
    pub fn to_hash_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(23);
        match self.addr.ip() {
            IpAddr::V4(ip) => {
                buf.push(4);
                buf.extend_from_slice(&ip.octets());
            }
            IpAddr::V6(ip) => {
                buf.push(6);
                buf.extend_from_slice(&ip.octets());
            }
        }
        buf.extend_from_slice(&self.addr.port().to_be_bytes());
        buf.extend_from_slice(&self.generation.to_be_bytes());
        buf
    }

    /// Full 64-bit consistent hash of this member.
    pub fn consistent_hash(&self) -> u64 {
        hash::hash_bytes(&self.to_hash_bytes())
    }

    /// Position of this member on a ring of `ring_size` slots.
    pub fn ring_position(&self, ring_size: u64) -> RingPosition {
        hash::reduce(self.consistent_hash(), ring_size)
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}@{}", self.addr, self.generation)
    }
}

/// Opaque grain identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GrainId(Bytes);

impl GrainId {
    /// Create a grain id from raw key bytes.
    pub fn new(key: impl Into<Bytes>) -> Self {
        Self(key.into())
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Full 64-bit consistent hash of this grain.
    pub fn consistent_hash(&self) -> u64 {
        hash::hash_bytes(&self.0)
    }

    /// Position of this grain on a ring of `ring_size` slots.
    pub fn ring_position(&self, ring_size: u64) -> RingPosition {
        hash::reduce(self.consistent_hash(), ring_size)
    }
}

impl From<&str> for GrainId {
    fn from(s: &str) -> Self {
        Self(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for GrainId {
    fn from(s: String) -> Self {
        Self(Bytes::from(s))
    }
}

impl fmt::Display for GrainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => write!(f, "{}", s),
            Err(_) => {
                for b in self.0.iter() {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
        }
    }
}

/// Identifier of one concrete activation of a grain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActivationId(Uuid);

impl ActivationId {
    /// Generate a fresh random activation id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing uuid.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// The underlying uuid.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ActivationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActivationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0.simple())
    }
}

/// Resolved location of a grain's single live activation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivationAddress {
    /// The grain being hosted.
    pub grain: GrainId,
    /// Member hosting the activation.
    pub member: MemberId,
    /// The concrete activation on that member.
    pub activation: ActivationId,
}

impl ActivationAddress {
    /// Create a new activation address.
    pub fn new(grain: GrainId, member: MemberId, activation: ActivationId) -> Self {
        Self {
            grain,
            member,
            activation,
        }
    }
}

impl fmt::Display for ActivationAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {} {}]", self.member, self.grain, self.activation)
    }
}

/// A cached location together with the version assigned by its writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Where the grain lives.
    pub address: ActivationAddress,
    /// Writer-assigned version; higher is fresher.
    pub version: u64,
}

impl DirectoryEntry {
    /// Create a new entry.
    pub fn new(address: ActivationAddress, version: u64) -> Self {
        Self { address, version }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of resident entries.
    pub entry_count: u64,
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries evicted to stay within capacity.
    pub evictions: u64,
}

impl CacheStats {
    /// Fraction of reads that were hits.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_equality_is_structural() {
        let a = MemberId::local(11111, 1);
        let b = MemberId::local(11111, 1);
        let c = MemberId::local(11111, 2);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.consistent_hash(), b.consistent_hash());
    }

    #[test]
    fn test_member_hash_bytes_layout() {
        let m = MemberId::local(0x1234, 7);
        assert_eq!(
            m.to_hash_bytes(),
            vec![4, 127, 0, 0, 1, 0x12, 0x34, 0, 0, 0, 7]
        );
    }

    #[test]
    fn test_member_ordering_uses_address_bytes() {
        let low = MemberId::local(1000, 1);
        let high = MemberId::local(2000, 1);
        assert!(low < high);
    }

    #[test]
    fn test_grain_display() {
        assert_eq!(GrainId::from("user/42").to_string(), "user/42");
        assert_eq!(GrainId::new(vec![0xff, 0x01]).to_string(), "ff01");
    }

    #[test]
    fn test_grain_position_within_ring() {
        let g = GrainId::from("grain");
        assert!(g.ring_position(1000) < 1000);
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }
}
