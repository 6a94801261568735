//! Consistent hash ring over cluster members.
//!
//! Each member occupies exactly one position, derived from the ring hash of
//! its identity. A key belongs to the member at the smallest position greater
//! than or equal to the key, wrapping around to the lowest position.
//!
//! Members whose positions collide share a slot; the smallest [`MemberId`]
//! (by raw address bytes) owns the slot and the others own nothing.

use super::range::{RingPosition, RingRange, RING_SIZE};
use crate::error::{Error, Result};
use crate::types::MemberId;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Bound::{Excluded, Unbounded};

/// An ordered set of member positions.
///
/// The structure only depends on the set of members it holds, never on the
/// order in which they were added or removed, so two rings fed the same
/// membership compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashRing {
    /// Number of slots on the ring.
    ring_size: u64,

    /// Occupied positions, each with the members hashed onto it.
    positions: BTreeMap<RingPosition, BTreeSet<MemberId>>,

    /// Total members across all positions.
    member_count: usize,
}

impl HashRing {
    /// Create an empty ring with `ring_size` slots.
    ///
    /// A ring needs at least one slot; zero is rejected with
    /// [`Error::Config`].
    pub fn new(ring_size: u64) -> Result<Self> {
        if ring_size == 0 {
            return Err(Error::Config("ring size must be positive".into()));
        }
        Ok(Self {
            ring_size,
            positions: BTreeMap::new(),
            member_count: 0,
        })
    }

    /// Number of slots on the ring.
    pub fn ring_size(&self) -> u64 {
        self.ring_size
    }

    /// Number of members on the ring.
    pub fn len(&self) -> usize {
        self.member_count
    }

    /// Whether the ring holds no member.
    pub fn is_empty(&self) -> bool {
        self.member_count == 0
    }

    /// Position `member` occupies (or would occupy) on this ring.
    pub fn position_of(&self, member: &MemberId) -> RingPosition {
        member.ring_position(self.ring_size)
    }

    /// Whether `member` is on the ring.
    pub fn contains(&self, member: &MemberId) -> bool {
        self.positions
            .get(&self.position_of(member))
            .is_some_and(|slot| slot.contains(member))
    }

    /// Insert a member. Returns `false` if it was already present.
    pub fn add(&mut self, member: MemberId) -> bool {
        let position = self.position_of(&member);
        let inserted = self.positions.entry(position).or_default().insert(member);
        if inserted {
            self.member_count += 1;
        }
        inserted
    }

    /// Remove a member. Returns `false` if it was not present.
    pub fn remove(&mut self, member: &MemberId) -> bool {
        let position = self.position_of(member);
        let Some(slot) = self.positions.get_mut(&position) else {
            return false;
        };
        if !slot.remove(member) {
            return false;
        }
        if slot.is_empty() {
            self.positions.remove(&position);
        }
        self.member_count -= 1;
        true
    }

    /// The member responsible for `key`, or `None` on an empty ring.
    ///
    /// Keys outside `[0, ring_size)` are reduced modulo the ring size first.
    pub fn owner_of(&self, key: RingPosition) -> Option<MemberId> {
        let key = key % self.ring_size;
        self.positions
            .range(key..)
            .next()
            .or_else(|| self.positions.iter().next())
            .and_then(|(_, slot)| slot.first().copied())
    }

    /// The range owned by `member`, or `None` if it is not on the ring.
    pub fn range_of(&self, member: &MemberId) -> Option<RingRange> {
        let position = self.position_of(member);
        let slot = self.positions.get(&position)?;
        if !slot.contains(member) {
            return None;
        }
        if slot.first() != Some(member) {
            return Some(RingRange::Empty);
        }

        let predecessor = self
            .positions
            .range(..position)
            .next_back()
            .or_else(|| self.positions.range((Excluded(position), Unbounded)).next_back())
            .map(|(&p, _)| p);

        Some(match predecessor {
            Some(begin) => RingRange::span(begin, position),
            None => RingRange::Full,
        })
    }

    /// All members in ring order.
    pub fn members(&self) -> Vec<MemberId> {
        self.iter().map(|(_, m)| *m).collect()
    }

    /// Iterate `(position, member)` pairs in ring order.
    pub fn iter(&self) -> impl Iterator<Item = (RingPosition, &MemberId)> + '_ {
        self.positions
            .iter()
            .flat_map(|(&p, slot)| slot.iter().map(move |m| (p, m)))
    }

    /// Up to `count` members following `member` clockwise, excluding it.
    pub fn successors(&self, member: &MemberId, count: usize) -> Vec<MemberId> {
        self.neighbours(member, count, false)
    }

    /// Up to `count` members preceding `member` counter-clockwise, excluding it.
    pub fn predecessors(&self, member: &MemberId, count: usize) -> Vec<MemberId> {
        self.neighbours(member, count, true)
    }

    fn neighbours(&self, member: &MemberId, count: usize, backwards: bool) -> Vec<MemberId> {
        let ordered = self.members();
        let Some(index) = ordered.iter().position(|m| m == member) else {
            return Vec::new();
        };
        let n = ordered.len();
        (1..n)
            .map(|step| {
                if backwards {
                    ordered[(index + n - step) % n]
                } else {
                    ordered[(index + step) % n]
                }
            })
            .take(count)
            .collect()
    }
}

impl fmt::Display for HashRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ring of {} member(s), {} slots:", self.member_count, self.ring_size)?;
        for (position, member) in self.iter() {
            let range = self.range_of(member).unwrap_or(RingRange::Empty);
            let share = range.len(self.ring_size) as f64 / self.ring_size as f64 * 100.0;
            writeln!(f, "  {:#010x} {} -> {} ({:.2}%)", position, member, range, share)?;
        }
        Ok(())
    }
}

impl Default for HashRing {
    /// An empty ring of [`RING_SIZE`] slots.
    fn default() -> Self {
        Self {
            ring_size: RING_SIZE,
            positions: BTreeMap::new(),
            member_count: 0,
        }
    }
}
