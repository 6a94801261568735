//! Grain location resolution on one node.
//!
//! [`GrainLocator`] ties the ring and the directory cache together: the ring
//! says which member owns a grain's directory partition, the cache remembers
//! recent answers, and a [`DirectoryResolver`] asks the owning member when the
//! cache has nothing usable.

use super::cache::DirectoryCache;
use crate::cluster::MemberEvent;
use crate::config::LocatorConfig;
use crate::error::Result;
use crate::metrics::MetricsSink;
use crate::partitioning::RingPartitioner;
use crate::types::{ActivationAddress, DirectoryEntry, GrainId, MemberId};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Query against the directory partition owned by another member.
pub trait DirectoryResolver: Send + Sync {
    /// Ask `directory`, the owner of `grain`'s partition, where `grain` lives.
    ///
    /// Failures should be reported as [`Error::Resolver`](crate::error::Error::Resolver).
    fn resolve(&self, directory: MemberId, grain: &GrainId) -> Result<Option<DirectoryEntry>>;
}

/// Per-node grain locator.
pub struct GrainLocator {
    ring: RingPartitioner,
    cache: DirectoryCache,
    resolver: Arc<dyn DirectoryResolver>,
}

impl GrainLocator {
    /// Build a locator whose ring holds only the configured local member.
    ///
    /// Fails with [`Error::Config`](crate::Error::Config) if the ring or
    /// cache settings are invalid.
    ///
    /// ```rust
    /// use grain_locator::{
    ///     DirectoryEntry, DirectoryResolver, GrainId, GrainLocator, LocatorConfig, MemberId,
    ///     NoopMetrics, Result,
    /// };
    /// use std::sync::Arc;
    ///
    /// struct EmptyDirectory;
    ///
    /// impl DirectoryResolver for EmptyDirectory {
    ///     fn resolve(&self, _: MemberId, _: &GrainId) -> Result<Option<DirectoryEntry>> {
    ///         Ok(None)
    ///     }
    /// }
    ///
    /// let local = MemberId::local(11111, 1);
    /// let locator = GrainLocator::new(
    ///     LocatorConfig::new(local),
    ///     Arc::new(EmptyDirectory),
    ///     NoopMetrics::shared(),
    /// )?;
    /// assert_eq!(locator.ring().members(), vec![local]);
    /// assert!(locator.cache().is_empty());
    /// assert_eq!(locator.locate(&GrainId::from("user/1"))?, None);
    /// # Ok::<(), grain_locator::Error>(())
    /// ```
    pub fn new(
        config: LocatorConfig,
        resolver: Arc<dyn DirectoryResolver>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self> {
        config.validate()?;
        let ring = RingPartitioner::new(config.ring, metrics.clone())?;
        let cache = DirectoryCache::new(config.directory_cache, metrics)?;

        Ok(Self {
            ring,
            cache,
            resolver,
        })
    }

    /// Where `grain` currently lives, if anywhere.
    ///
    /// Cached entries are trusted only while their host is still on the ring.
    /// On a miss the owning directory is queried, and answers from remote
    /// partitions are cached.
    pub fn locate(&self, grain: &GrainId) -> Result<Option<ActivationAddress>> {
        if let Some(entry) = self
            .cache
            .lookup_valid(grain, |address| self.ring.contains(&address.member))
        {
            return Ok(Some(entry.address));
        }

        let directory = self.primary_directory_for(grain);
        let Some(entry) = self.resolver.resolve(directory, grain)? else {
            return Ok(None);
        };

        if !self.ring.contains(&entry.address.member) {
            debug!(
                grain = %grain,
                address = %entry.address,
                "Resolved location is hosted on a member that is not on the ring"
            );
            return Ok(None);
        }

        if directory != self.ring.local_member() {
            self.cache.add_or_update(entry.address.clone(), entry.version);
        }
        Ok(Some(entry.address))
    }

    /// Member owning the directory partition for `grain`.
    pub fn primary_directory_for(&self, grain: &GrainId) -> MemberId {
        self.ring.get_primary_target_for_grain(grain)
    }

    /// Apply a directory push notification.
    pub fn on_location_update(&self, address: ActivationAddress, version: u64) -> bool {
        self.cache.add_or_update(address, version)
    }

    /// Forget `address` if it is still the cached location of its grain.
    pub fn invalidate(&self, address: &ActivationAddress) -> bool {
        self.cache.remove_address(address)
    }

    /// Apply a membership change to the ring and prune the cache to match.
    ///
    /// Entries hosted on a departed member are dropped, and so are entries for
    /// grains whose directory partition the local member now owns. Returns
    /// whether the ring changed.
    pub fn on_member_event(&self, event: &MemberEvent) -> bool {
        let member = event.member();
        let changed = self.ring.apply(event);

        let mut hosted = 0;
        if event.is_leave() {
            hosted = self.cache.remove_member(&member);
        }

        let mut owned = 0;
        if changed {
            let local = self.ring.local_member();
            owned = self
                .cache
                .remove_grains_where(|grain| self.ring.get_primary_target_for_grain(grain) == local);
        }

        if hosted + owned > 0 {
            info!(
                member = %member,
                hosted,
                owned,
                "Pruned directory cache after membership change"
            );
        }
        changed
    }

    /// The local member lost a directory partition; its cached view can no
    /// longer be trusted.
    pub fn on_directory_ownership_lost(&self) {
        self.cache.clear();
    }

    /// This node's ring view.
    pub fn ring(&self) -> &RingPartitioner {
        &self.ring
    }

    /// The local location cache.
    pub fn cache(&self) -> &DirectoryCache {
        &self.cache
    }
}

impl fmt::Debug for GrainLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrainLocator")
            .field("ring", &self.ring)
            .field("cache", &self.cache)
            .finish()
    }
}
