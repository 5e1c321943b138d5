//! Feed cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_TTL_SECS: u64 = 120;
const DEFAULT_CAPACITY: usize = 10_000;
const DEFAULT_SNAPSHOT_LIMIT: usize = 50;
const DEFAULT_OP_TIMEOUT_MS: u64 = 250;

/// Where cached feed snapshots live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStoreKind {
    /// In-process LRU; per-instance and lost on restart.
    Memory,
    /// Shared Redis instance.
    Redis,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Wrap storage in the cache-aside decorator.
    pub enabled: bool,
    pub store: CacheStoreKind,
    pub redis_url: Option<String>,
    /// Lifetime of a snapshot; also the upper bound on how stale a feed can get.
    pub ttl: Duration,
    /// Maximum number of owners held by the in-process store.
    pub capacity: usize,
    /// Maximum number of posts kept per snapshot.
    pub snapshot_limit: usize,
    /// Populate the cache from a detached task after a miss instead of before returning.
    pub populate_in_background: bool,
    /// Upper bound on a single cache round trip. An expired call counts as a cache error.
    pub op_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            store: CacheStoreKind::Memory,
            redis_url: None,
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            capacity: DEFAULT_CAPACITY,
            snapshot_limit: DEFAULT_SNAPSHOT_LIMIT,
            populate_in_background: true,
            op_timeout: Duration::from_millis(DEFAULT_OP_TIMEOUT_MS),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            store: settings.store,
            redis_url: settings.redis_url.clone(),
            ttl: settings.ttl,
            capacity: settings.capacity.get(),
            snapshot_limit: settings.snapshot_limit.get(),
            populate_in_background: settings.populate_in_background,
            op_timeout: settings.op_timeout,
        }
    }
}

impl CacheConfig {
    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }

    /// Returns the snapshot limit, clamping to 1 if zero.
    pub fn snapshot_limit_non_zero(&self) -> usize {
        self.snapshot_limit.max(1)
    }
}
