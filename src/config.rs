//! Configuration types for the locator.

use crate::error::{Error, Result};
use crate::partitioning::RING_SIZE;
use crate::types::MemberId;
use std::time::Duration;

/// Configuration for a [`RingPartitioner`](crate::partitioning::RingPartitioner).
#[derive(Debug, Clone)]
pub struct RingConfig {
    /// Identity of the member that owns this ring instance. Required.
    pub local_member: Option<MemberId>,

    /// Number of slots on the ring. Must be positive.
    pub ring_size: u64,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            local_member: None,
            ring_size: RING_SIZE,
        }
    }
}

impl RingConfig {
    /// Create a configuration for the given local member.
    pub fn new(local_member: MemberId) -> Self {
        Self {
            local_member: Some(local_member),
            ..Default::default()
        }
    }

    /// Set the number of ring slots.
    pub fn with_ring_size(mut self, ring_size: u64) -> Self {
        self.ring_size = ring_size;
        self
    }

    /// Check the configuration, returning the local member on success.
    pub fn validate(&self) -> Result<MemberId> {
        if self.ring_size == 0 {
            return Err(Error::Config("ring size must be positive".into()));
        }
        self.local_member
            .ok_or_else(|| Error::Config("local member identity is required".into()))
    }
}

/// Configuration for a [`DirectoryCache`](crate::directory::DirectoryCache).
#[derive(Debug, Clone)]
pub struct DirectoryCacheConfig {
    /// Maximum number of resident entries.
    pub max_capacity: usize,

    /// Entries older than this are treated as absent.
    pub max_age: Option<Duration>,
}

impl Default for DirectoryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 1_000_000,
            max_age: None,
        }
    }
}

impl DirectoryCacheConfig {
    /// Create a configuration with the given capacity and no age limit.
    pub fn new(max_capacity: usize) -> Self {
        Self {
            max_capacity,
            ..Default::default()
        }
    }

    /// Set maximum capacity.
    pub fn with_max_capacity(mut self, capacity: usize) -> Self {
        self.max_capacity = capacity;
        self
    }

    /// Set maximum entry age.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Check the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_capacity == 0 {
            return Err(Error::Config("directory cache capacity must be positive".into()));
        }
        if self.max_age == Some(Duration::ZERO) {
            return Err(Error::Config("directory cache max age must be positive".into()));
        }
        Ok(())
    }
}

/// Configuration for a [`GrainLocator`](crate::directory::GrainLocator).
#[derive(Debug, Clone)]
pub struct LocatorConfig {
    /// Ring settings, including the local member.
    pub ring: RingConfig,

    /// Directory cache settings.
    pub directory_cache: DirectoryCacheConfig,
}

impl LocatorConfig {
    /// Create a configuration for the given local member with defaults elsewhere.
    pub fn new(local_member: MemberId) -> Self {
        Self {
            ring: RingConfig::new(local_member),
            directory_cache: DirectoryCacheConfig::default(),
        }
    }

    /// Set the number of ring slots.
    pub fn with_ring_size(mut self, ring_size: u64) -> Self {
        self.ring.ring_size = ring_size;
        self
    }

    /// Set the directory cache capacity.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.directory_cache.max_capacity = capacity;
        self
    }

    /// Set the directory cache max entry age.
    pub fn with_cache_max_age(mut self, max_age: Duration) -> Self {
        self.directory_cache.max_age = Some(max_age);
        self
    }

    /// Check every section.
    pub fn validate(&self) -> Result<()> {
        self.ring.validate()?;
        self.directory_cache.validate()
    }
}
