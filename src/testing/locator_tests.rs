//! Several locators sharing one authoritative directory.

use super::init_tracing;
use crate::cluster::MemberEvent;
use crate::config::LocatorConfig;
use crate::directory::{DirectoryResolver, GrainLocator};
use crate::error::{Error, Result};
use crate::metrics::{LocatorMetrics, MetricsSink};
use crate::types::{ActivationAddress, ActivationId, DirectoryEntry, GrainId, MemberId};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Authoritative directory standing in for every member's partition.
#[derive(Default)]
struct SharedDirectory {
    entries: Mutex<HashMap<GrainId, DirectoryEntry>>,
    down: Mutex<HashSet<MemberId>>,
    asked: Mutex<Vec<MemberId>>,
}

impl SharedDirectory {
    fn register(&self, address: ActivationAddress, version: u64) {
        self.entries
            .lock()
            .insert(address.grain.clone(), DirectoryEntry::new(address, version));
    }

    fn member_down(&self, member: MemberId) {
        self.down.lock().insert(member);
        self.entries
            .lock()
            .retain(|_, entry| entry.address.member != member);
    }
}

impl DirectoryResolver for SharedDirectory {
    fn resolve(&self, directory: MemberId, grain: &GrainId) -> Result<Option<DirectoryEntry>> {
        self.asked.lock().push(directory);
        if self.down.lock().contains(&directory) {
            return Err(Error::Resolver(format!("directory {directory} is down")));
        }
        Ok(self.entries.lock().get(grain).cloned())
    }
}

struct Node {
    member: MemberId,
    locator: GrainLocator,
}

fn start_nodes(count: u16, directory: &Arc<SharedDirectory>) -> Vec<Node> {
    let members: Vec<MemberId> = (1..=count).map(|i| MemberId::local(40000 + i, 1)).collect();
    let nodes: Vec<Node> = members
        .iter()
        .map(|&member| Node {
            member,
            locator: GrainLocator::new(
                LocatorConfig::new(member).with_cache_capacity(256),
                directory.clone(),
                Arc::new(LocatorMetrics::new()),
            )
            .unwrap(),
        })
        .collect();

    for node in &nodes {
        for &member in &members {
            node.locator
                .on_member_event(&MemberEvent::MemberJoined { member });
        }
    }
    nodes
}

fn broadcast(nodes: &[Node], event: MemberEvent) {
    for node in nodes {
        node.locator.on_member_event(&event);
    }
}

#[test]
fn test_nodes_agree_on_directory_owner() {
    init_tracing();
    let directory = Arc::new(SharedDirectory::default());
    let nodes = start_nodes(4, &directory);

    for i in 0..100 {
        let grain = GrainId::from(format!("user/{i}"));
        let owner = nodes[0].locator.primary_directory_for(&grain);
        for node in &nodes[1..] {
            assert_eq!(node.locator.primary_directory_for(&grain), owner);
        }
    }
}

#[test]
fn test_all_nodes_locate_same_activation() {
    let directory = Arc::new(SharedDirectory::default());
    let nodes = start_nodes(4, &directory);

    let grains: Vec<GrainId> = (0..50).map(|i| GrainId::from(format!("order/{i}"))).collect();
    for (i, grain) in grains.iter().enumerate() {
        let host = nodes[i % nodes.len()].member;
        directory.register(ActivationAddress::new(grain.clone(), host, ActivationId::new()), 1);
    }

    for grain in &grains {
        let expected = directory.entries.lock()[grain].address.clone();
        for node in &nodes {
            assert_eq!(node.locator.locate(grain).unwrap(), Some(expected.clone()));
        }
    }

    // Repeated lookups of remotely owned grains are served from cache.
    let asked_before = directory.asked.lock().len();
    for node in &nodes {
        for grain in &grains {
            if node.locator.primary_directory_for(grain) != node.member {
                node.locator.locate(grain).unwrap();
            }
        }
    }
    assert_eq!(directory.asked.lock().len(), asked_before);
}

#[test]
fn test_dead_member_is_never_returned() {
    let directory = Arc::new(SharedDirectory::default());
    let mut nodes = start_nodes(5, &directory);
    let victim = nodes[2].member;

    let grains: Vec<GrainId> = (0..40).map(|i| GrainId::from(format!("cart/{i}"))).collect();
    for (i, grain) in grains.iter().enumerate() {
        let host = nodes[i % nodes.len()].member;
        directory.register(ActivationAddress::new(grain.clone(), host, ActivationId::new()), 1);
    }
    for node in &nodes {
        for grain in &grains {
            node.locator.locate(grain).unwrap();
        }
    }

    nodes.remove(2);
    directory.member_down(victim);
    broadcast(&nodes, MemberEvent::MemberDead { member: victim });
    directory.asked.lock().clear();

    for node in &nodes {
        assert!(!node.locator.ring().contains(&victim));
        for entry in node.locator.cache().key_values() {
            assert_ne!(entry.address.member, victim);
        }
        for grain in &grains {
            // The survivors' rings no longer route to the dead directory.
            if let Some(address) = node.locator.locate(grain).unwrap() {
                assert_ne!(address.member, victim);
            }
        }
    }
    assert!(!directory.asked.lock().contains(&victim));
}

#[test]
fn test_relocated_grain_newer_version_wins() {
    let directory = Arc::new(SharedDirectory::default());
    let nodes = start_nodes(3, &directory);
    let grain = (0..)
        .map(|i| GrainId::from(format!("session/{i}")))
        .find(|g| nodes[0].locator.primary_directory_for(g) != nodes[0].member)
        .unwrap();

    let first = ActivationAddress::new(grain.clone(), nodes[1].member, ActivationId::new());
    let moved = ActivationAddress::new(grain.clone(), nodes[2].member, ActivationId::new());
    directory.register(first.clone(), 1);
    assert_eq!(nodes[0].locator.locate(&grain).unwrap(), Some(first.clone()));

    // Push notifications arrive out of order.
    assert!(nodes[0].locator.on_location_update(moved.clone(), 2));
    assert!(!nodes[0].locator.on_location_update(first, 1));
    assert_eq!(nodes[0].locator.locate(&grain).unwrap(), Some(moved));
}

#[test]
fn test_locator_metrics_reflect_traffic() {
    let directory = Arc::new(SharedDirectory::default());
    let member = MemberId::local(41000, 1);
    let metrics = Arc::new(LocatorMetrics::new());
    let sink: Arc<dyn MetricsSink> = metrics.clone();
    let locator = GrainLocator::new(LocatorConfig::new(member), directory.clone(), sink).unwrap();
    locator.on_member_event(&MemberEvent::MemberJoined {
        member: MemberId::local(41001, 1),
    });

    let grain = GrainId::from("metrics/1");
    directory.register(
        ActivationAddress::new(grain.clone(), MemberId::local(41001, 1), ActivationId::new()),
        1,
    );
    locator.locate(&grain).unwrap();
    locator.locate(&grain).unwrap();

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.ring_members, 2);
    assert_eq!(snapshot.ring_adds, 1);
    assert!(snapshot.lookup_misses >= 1);
    assert!(metrics.to_prometheus().contains("directory_cache_misses_total"));
}
