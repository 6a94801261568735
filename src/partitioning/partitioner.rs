//! Per-node view of the consistent hash ring.
//!
//! A [`RingPartitioner`] is created once per node, holding only the local
//! member, and is then driven by membership callbacks for the node's whole
//! lifetime. Lookups take a shared read lock; membership changes take the
//! write lock for the duration of a single `O(log n)` mutation.
//!
//! Range changes are queued while the write lock is held and delivered to
//! listeners after it is released, one writer at a time, so listeners observe
//! them in the order the ring was mutated.

use super::hashring::HashRing;
use super::range::{RingPosition, RingRange};
use crate::cluster::MemberEvent;
use crate::config::RingConfig;
use crate::error::Result;
use crate::metrics::{MetricsSink, NoopMetrics};
use crate::types::{GrainId, MemberId};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Notified whenever the local member's range changes.
///
/// Calls arrive in mutation order and never overlap. A listener may read the
/// ring but must not add or remove members from inside the callback.
pub trait RingRangeListener: Send + Sync {
    /// `increased` is true when the new range covers more positions than the old one.
    fn on_range_change(&self, old: RingRange, new: RingRange, increased: bool);
}

/// Thread-safe consistent hash ring owned by one node.
pub struct RingPartitioner {
    /// The member running this instance. Always on the ring.
    local_member: MemberId,

    /// The ring itself.
    ring: RwLock<HashRing>,

    /// Subscribers to local range changes.
    listeners: RwLock<Vec<Arc<dyn RingRangeListener>>>,

    /// `(old, new)` local ranges, pushed under the ring write lock.
    pending: Mutex<VecDeque<(RingRange, RingRange)>>,

    /// Held while draining `pending`.
    delivery: Mutex<()>,

    /// Where ring events are reported.
    metrics: Arc<dyn MetricsSink>,
}

impl RingPartitioner {
    /// Create a ring holding only the configured local member.
    pub fn new(config: RingConfig, metrics: Arc<dyn MetricsSink>) -> Result<Self> {
        let local_member = config.validate()?;

        let mut ring = HashRing::new(config.ring_size)?;
        ring.add(local_member);
        metrics.ring_members(ring.len());

        debug!(
            member = %local_member,
            position = ring.position_of(&local_member),
            ring_size = config.ring_size,
            "Created ring partitioner"
        );

        Ok(Self::with_ring(local_member, ring, metrics))
    }

    /// Create a ring with default settings and no metrics.
    pub fn for_member(local_member: MemberId) -> Self {
        let mut ring = HashRing::default();
        ring.add(local_member);
        Self::with_ring(local_member, ring, NoopMetrics::shared())
    }

    fn with_ring(local_member: MemberId, ring: HashRing, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            local_member,
            ring: RwLock::new(ring),
            listeners: RwLock::new(Vec::new()),
            pending: Mutex::new(VecDeque::new()),
            delivery: Mutex::new(()),
            metrics,
        }
    }

    /// The member running this instance.
    pub fn local_member(&self) -> MemberId {
        self.local_member
    }

    /// Number of slots on the ring.
    pub fn ring_size(&self) -> u64 {
        self.ring.read().ring_size()
    }

    /// Add a member to the ring. Returns `false` if it was already present.
    pub fn add_server(&self, member: MemberId) -> bool {
        let Some(members) = self.mutate(|ring| ring.add(member)) else {
            return false;
        };

        self.metrics.ring_member_added();
        self.metrics.ring_members(members);
        info!(member = %member, members, "Added member to ring");

        self.deliver_range_changes();
        true
    }

    /// Remove a member from the ring. Returns `false` if it was not present.
    ///
    /// The local member cannot be removed; such requests are logged and ignored.
    pub fn remove_server(&self, member: &MemberId) -> bool {
        if *member == self.local_member {
            warn!(member = %member, "Refusing to remove the local member from its own ring");
            return false;
        }

        let Some(members) = self.mutate(|ring| ring.remove(member)) else {
            return false;
        };

        self.metrics.ring_member_removed();
        self.metrics.ring_members(members);
        info!(member = %member, members, "Removed member from ring");

        self.deliver_range_changes();
        true
    }

    /// Apply a membership event. Returns whether the ring changed.
    pub fn apply(&self, event: &MemberEvent) -> bool {
        if event.is_join() {
            self.add_server(event.member())
        } else {
            self.remove_server(&event.member())
        }
    }

    /// The member responsible for `key`.
    ///
    /// Keys outside `[0, ring_size)` are reduced modulo the ring size.
    pub fn get_primary_target(&self, key: RingPosition) -> MemberId {
        self.ring
            .read()
            .owner_of(key)
            .unwrap_or(self.local_member)
    }

    /// The member responsible for `grain`.
    pub fn get_primary_target_for_grain(&self, grain: &GrainId) -> MemberId {
        let ring = self.ring.read();
        let key = grain.ring_position(ring.ring_size());
        ring.owner_of(key).unwrap_or(self.local_member)
    }

    /// The range owned by the local member.
    pub fn get_my_range(&self) -> RingRange {
        Self::local_range(&self.ring.read(), &self.local_member)
    }

    /// Up to `count` distinct members clockwise from the local member.
    pub fn get_my_successors(&self, count: usize) -> Vec<MemberId> {
        self.ring.read().successors(&self.local_member, count)
    }

    /// Up to `count` distinct members counter-clockwise from the local member.
    pub fn get_my_predecessors(&self, count: usize) -> Vec<MemberId> {
        self.ring.read().predecessors(&self.local_member, count)
    }

    /// Whether `member` is on the ring.
    pub fn contains(&self, member: &MemberId) -> bool {
        self.ring.read().contains(member)
    }

    /// All members in ring order.
    pub fn members(&self) -> Vec<MemberId> {
        self.ring.read().members()
    }

    /// Number of members on the ring, including the local member.
    pub fn member_count(&self) -> usize {
        self.ring.read().len()
    }

    /// Position `member` occupies on this ring.
    pub fn position_of(&self, member: &MemberId) -> RingPosition {
        self.ring.read().position_of(member)
    }

    /// A copy of the current ring.
    pub fn snapshot(&self) -> HashRing {
        self.ring.read().clone()
    }

    /// Register a listener for local range changes.
    pub fn subscribe(&self, listener: Arc<dyn RingRangeListener>) {
        self.listeners.write().push(listener);
    }

    /// Apply `op` under the write lock, queueing the local range change if
    /// there is one. Returns the member count if `op` changed the ring.
    fn mutate<F>(&self, op: F) -> Option<usize>
    where
        F: FnOnce(&mut HashRing) -> bool,
    {
        let mut ring = self.ring.write();
        let old = Self::local_range(&ring, &self.local_member);
        if !op(&mut ring) {
            return None;
        }
        let new = Self::local_range(&ring, &self.local_member);
        if old != new {
            self.pending.lock().push_back((old, new));
        }
        Some(ring.len())
    }

    fn local_range(ring: &HashRing, local: &MemberId) -> RingRange {
        // The local member is inserted at construction and never removed.
        ring.range_of(local).unwrap_or(RingRange::Full)
    }

    /// Deliver every queued range change. Called with the ring lock released.
    ///
    /// Whichever writer holds `delivery` drains the queue, including changes
    /// queued by writers still waiting for it.
    fn deliver_range_changes(&self) {
        let _delivery = self.delivery.lock();
        let ring_size = self.ring_size();

        loop {
            let Some((old, new)) = self.pending.lock().pop_front() else {
                break;
            };
            let increased = new.len(ring_size) > old.len(ring_size);
            self.metrics.ring_range_changed();
            debug!(old = %old, new = %new, increased, "Local ring range changed");

            let listeners: Vec<_> = self.listeners.read().clone();
            for listener in listeners {
                listener.on_range_change(old, new, increased);
            }
        }
    }
}

impl fmt::Debug for RingPartitioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingPartitioner")
            .field("local_member", &self.local_member)
            .field("members", &self.member_count())
            .field("my_range", &self.get_my_range())
            .finish()
    }
}

impl fmt::Display for RingPartitioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ring view of {}:", self.local_member)?;
        write!(f, "{}", self.ring.read())
    }
}
