//! Feed snapshot storage.
//!
//! A snapshot is a disposable copy of the head of one owner's feed. Losing one only
//! costs a storage read.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;

use crate::domain::entities::Post;
use crate::util::lock::{rw_read, rw_write};

use super::config::CacheConfig;

const SOURCE: &str = "cache::store";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("cache did not answer `{op}` within {timeout_ms} ms")]
    Timeout { op: &'static str, timeout_ms: u64 },
}

impl CacheError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Newest-first head of an owner's feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedFeed {
    pub posts: Vec<Post>,
    /// True when `posts` is the owner's entire feed rather than a prefix of it.
    pub complete: bool,
}

impl CachedFeed {
    /// Build a snapshot from a storage read of `requested` rows, keeping at most
    /// `snapshot_limit` posts.
    pub fn from_read(mut posts: Vec<Post>, requested: usize, snapshot_limit: usize) -> Self {
        let mut complete = posts.len() < requested;
        if posts.len() > snapshot_limit {
            posts.truncate(snapshot_limit);
            complete = false;
        }
        Self { posts, complete }
    }

    /// The first `limit` posts, or `None` when the snapshot is too short to answer.
    pub fn serve(&self, limit: usize) -> Option<Vec<Post>> {
        if self.complete || self.posts.len() >= limit {
            Some(self.posts.iter().take(limit).cloned().collect())
        } else {
            None
        }
    }
}

/// Volatile key-value store for feed snapshots, keyed by owner.
#[async_trait]
pub trait FeedCache: Send + Sync {
    async fn get(&self, owner_id: &str) -> Result<Option<CachedFeed>, CacheError>;

    async fn put(&self, owner_id: &str, feed: CachedFeed) -> Result<(), CacheError>;

    async fn invalidate(&self, owner_id: &str) -> Result<(), CacheError>;
}

struct Entry {
    feed: CachedFeed,
    expires_at: Instant,
}

/// In-process snapshot store with LRU eviction and per-entry expiry.
pub struct MemoryFeedCache {
    entries: RwLock<LruCache<String, Entry>>,
    ttl: Duration,
}

impl MemoryFeedCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
            ttl: config.ttl,
        }
    }

    /// Number of stored snapshots, expired ones included until they are next touched.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl FeedCache for MemoryFeedCache {
    async fn get(&self, owner_id: &str) -> Result<Option<CachedFeed>, CacheError> {
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        let expired = match entries.get(owner_id) {
            None => return Ok(None),
            Some(entry) if entry.expires_at > Instant::now() => {
                return Ok(Some(entry.feed.clone()));
            }
            Some(_) => true,
        };
        if expired {
            entries.pop(owner_id);
        }
        Ok(None)
    }

    async fn put(&self, owner_id: &str, feed: CachedFeed) -> Result<(), CacheError> {
        let entry = Entry {
            feed,
            expires_at: Instant::now() + self.ttl,
        };
        rw_write(&self.entries, SOURCE, "put").put(owner_id.to_string(), entry);
        Ok(())
    }

    async fn invalidate(&self, owner_id: &str) -> Result<(), CacheError> {
        rw_write(&self.entries, SOURCE, "invalidate").pop(owner_id);
        Ok(())
    }
}
