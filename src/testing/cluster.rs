//! A set of independent ring instances, one per simulated node.

use crate::config::RingConfig;
use crate::error::Result;
use crate::metrics::NoopMetrics;
use crate::partitioning::{verify_coverage, RingPartitioner, RingPosition, RING_SIZE};
use crate::types::MemberId;
use std::collections::BTreeMap;

/// Independent [`RingPartitioner`]s sharing nothing but the membership
/// updates the harness feeds them.
#[derive(Debug)]
pub struct TestCluster {
    ring_size: u64,
    rings: BTreeMap<MemberId, RingPartitioner>,
}

impl TestCluster {
    /// Create `count` nodes on the default ring size. Each ring initially
    /// knows only itself.
    pub fn new(count: usize) -> Result<Self> {
        Self::with_ring_size(count, RING_SIZE)
    }

    /// Create `count` nodes on a ring of `ring_size` slots.
    pub fn with_ring_size(count: usize, ring_size: u64) -> Result<Self> {
        let members = (1..=count).map(|i| MemberId::local(20000 + i as u16, 1));
        Self::from_members(members, ring_size)
    }

    /// Create one node per member.
    pub fn from_members<I>(members: I, ring_size: u64) -> Result<Self>
    where
        I: IntoIterator<Item = MemberId>,
    {
        let mut rings = BTreeMap::new();
        for member in members {
            let config = RingConfig::new(member).with_ring_size(ring_size);
            rings.insert(member, RingPartitioner::new(config, NoopMetrics::shared())?);
        }
        Ok(Self { ring_size, rings })
    }

    pub fn ring_size(&self) -> u64 {
        self.ring_size
    }

    pub fn len(&self) -> usize {
        self.rings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }

    /// The ring instance running on `member`.
    pub fn ring(&self, member: &MemberId) -> Option<&RingPartitioner> {
        self.rings.get(member)
    }

    pub fn rings(&self) -> impl Iterator<Item = &RingPartitioner> + '_ {
        self.rings.values()
    }

    /// Live members sorted by ring position, ties by member order.
    pub fn members_by_position(&self) -> Vec<MemberId> {
        let mut members: Vec<MemberId> = self.rings.keys().copied().collect();
        members.sort_by_key(|m| (m.ring_position(self.ring_size), *m));
        members
    }

    /// Tell every node about every other node.
    pub fn connect_all(&self) {
        for ring in self.rings.values() {
            for member in self.rings.keys() {
                ring.add_server(*member);
            }
        }
    }

    /// Merge `other` into this cluster: nodes on both sides learn about every
    /// node on either side.
    pub fn combine(&mut self, other: TestCluster) {
        self.rings.extend(other.rings);
        self.connect_all();
    }

    /// Detach `members` into a cluster of their own. Their rings keep
    /// whatever view they had.
    pub fn split_off(&mut self, members: &[MemberId]) -> TestCluster {
        let rings = members
            .iter()
            .filter_map(|m| self.rings.remove_entry(m))
            .collect();
        TestCluster {
            ring_size: self.ring_size,
            rings,
        }
    }

    /// Stop `failed` nodes and tell every survivor they are gone.
    pub fn remove_servers(&mut self, failed: &[MemberId]) {
        for member in failed {
            self.rings.remove(member);
        }
        for ring in self.rings.values() {
            for member in failed {
                ring.remove_server(member);
            }
        }
    }

    /// Check that the local ranges of all nodes tile the ring exactly once.
    pub fn check_ring(&self) -> Result<()> {
        verify_coverage(self.ring_size, self.rings.values().map(|r| r.get_my_range()))
    }

    /// Like [`check_ring`](Self::check_ring), panicking with a ring dump on
    /// failure.
    pub fn verify_ring(&self) {
        if let Err(err) = self.check_ring() {
            let dump: Vec<String> = self.rings.values().map(ToString::to_string).collect();
            panic!("ring verification failed: {err}\n{}", dump.join("\n"));
        }
    }

    /// The owner of `key` according to the successor rule, computed directly
    /// from the live member list.
    pub fn expected_owner(&self, key: RingPosition) -> Option<MemberId> {
        let key = key % self.ring_size;
        let sorted = self.members_by_position();
        sorted
            .iter()
            .find(|m| m.ring_position(self.ring_size) >= key)
            .or_else(|| sorted.first())
            .copied()
    }

    /// Assert that every node maps `key` to the expected owner, and return it.
    pub fn verify_key(&self, key: RingPosition) -> MemberId {
        let Some(truth) = self.expected_owner(key) else {
            panic!("cannot verify key {key:#x} on an empty cluster");
        };
        for (member, ring) in &self.rings {
            let owner = ring.get_primary_target(key);
            assert_eq!(
                owner, truth,
                "lookup wrong for key {key:#x} on {member}: got {owner}, expected {truth}"
            );
        }
        truth
    }

    /// Verify the boundary keys just below the lowest member position and just
    /// above the highest one. Both belong to the lowest-positioned member.
    pub fn verify_boundaries(&self) {
        let sorted = self.members_by_position();
        let (Some(first), Some(last)) = (sorted.first(), sorted.last()) else {
            return;
        };
        let first_position = first.ring_position(self.ring_size);
        let highest = (last.ring_position(self.ring_size) + 1) % self.ring_size;
        assert_eq!(self.verify_key(highest), *first, "highest boundary key {highest:#x}");

        // Below position zero is the top of the ring, which the highest
        // member may occupy itself.
        if let Some(lowest) = first_position.checked_sub(1) {
            assert_eq!(self.verify_key(lowest), *first, "lowest boundary key {lowest:#x}");
        } else {
            self.verify_key(self.ring_size - 1);
        }
    }
}
