//! Cache-aside decorator over any [`TimelineStore`].
//!
//! Reads check the snapshot store first and fall back to the wrapped storage on a
//! miss. Writes always go to the wrapped storage first; cache effects afterwards are
//! advisory, and every cache failure is logged and swallowed so the cache degrades to
//! "always miss" rather than failing a call.
//!
//! Population after a miss runs on a detached task by default: the read returns as soon
//! as storage answers, so an immediate second read of the same owner may miss again.
//! A population racing an invalidation for the same owner can leave a stale snapshot;
//! the TTL bounds how long it survives.
//!
//! Every cache round trip is bounded by `op_timeout`. The invalidations that follow a
//! write share one such budget, so a cache that stops answering costs a write at most
//! one `op_timeout` on top of the storage work.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::application::repos::{RepoError, TimelineStore};
use crate::domain::entities::Post;

use super::config::CacheConfig;
use super::store::{CacheError, CachedFeed, FeedCache};

pub const METRIC_FEED_CACHE_HIT: &str = "murmur_feed_cache_hit_total";
pub const METRIC_FEED_CACHE_MISS: &str = "murmur_feed_cache_miss_total";
pub const METRIC_FEED_CACHE_POPULATE_FAILED: &str = "murmur_feed_cache_populate_failed_total";
pub const METRIC_FEED_CACHE_INVALIDATE: &str = "murmur_feed_cache_invalidate_total";
pub const METRIC_FEED_CACHE_ERROR: &str = "murmur_feed_cache_error_total";

pub struct CachedTimelineStore {
    inner: Arc<dyn TimelineStore>,
    cache: Arc<dyn FeedCache>,
    snapshot_limit: usize,
    populate_in_background: bool,
    op_timeout: Duration,
}

impl CachedTimelineStore {
    pub fn new(
        inner: Arc<dyn TimelineStore>,
        cache: Arc<dyn FeedCache>,
        config: &CacheConfig,
    ) -> Self {
        Self {
            inner,
            cache,
            snapshot_limit: config.snapshot_limit_non_zero(),
            populate_in_background: config.populate_in_background,
            op_timeout: config.op_timeout,
        }
    }

    async fn cached(&self, owner_id: &str, limit: usize) -> Option<Vec<Post>> {
        let deadline = Instant::now() + self.op_timeout;
        match bounded("get", deadline, self.op_timeout, self.cache.get(owner_id)).await {
            Ok(Some(snapshot)) => snapshot.serve(limit),
            Ok(None) => None,
            Err(err) => {
                warn!(owner_id, error = %err, "Feed cache read failed; reading storage");
                None
            }
        }
    }

    async fn populate(&self, owner_id: &str, snapshot: CachedFeed) {
        let cache = Arc::clone(&self.cache);
        let owner_id = owner_id.to_string();
        let op_timeout = self.op_timeout;
        let task =
            async move { store_snapshot(cache.as_ref(), &owner_id, snapshot, op_timeout).await };

        if self.populate_in_background {
            // Detached; nothing joins this handle.
            tokio::spawn(task);
        } else {
            task.await;
        }
    }

    async fn invalidate(&self, owners: &[String]) {
        let deadline = Instant::now() + self.op_timeout;
        for (done, owner_id) in owners.iter().enumerate() {
            let call = self.cache.invalidate(owner_id);
            match bounded("invalidate", deadline, self.op_timeout, call).await {
                Ok(()) => {
                    counter!(METRIC_FEED_CACHE_INVALIDATE).increment(1);
                }
                Err(err @ CacheError::Timeout { .. }) => {
                    warn!(
                        owner_id = %owner_id,
                        skipped = owners.len() - done - 1,
                        error = %err,
                        "Feed cache invalidation timed out; remaining entries expire with their TTL"
                    );
                    return;
                }
                Err(err) => {
                    warn!(
                        owner_id = %owner_id,
                        error = %err,
                        "Feed cache invalidation failed; entry expires with its TTL"
                    );
                }
            }
        }
    }
}

/// Runs one cache call against `deadline`, counting every failure under `op`.
async fn bounded<T>(
    op: &'static str,
    deadline: Instant,
    budget: Duration,
    call: impl Future<Output = Result<T, CacheError>>,
) -> Result<T, CacheError> {
    let result = match tokio::time::timeout_at(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(CacheError::Timeout {
            op,
            timeout_ms: u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
        }),
    };
    if result.is_err() {
        counter!(METRIC_FEED_CACHE_ERROR, "op" => op).increment(1);
    }
    result
}

async fn store_snapshot(
    cache: &dyn FeedCache,
    owner_id: &str,
    snapshot: CachedFeed,
    op_timeout: Duration,
) {
    let posts = snapshot.posts.len();
    let deadline = Instant::now() + op_timeout;
    match bounded("put", deadline, op_timeout, cache.put(owner_id, snapshot)).await {
        Ok(()) => debug!(owner_id, posts, "Feed cache populated"),
        Err(err) => {
            counter!(METRIC_FEED_CACHE_POPULATE_FAILED).increment(1);
            warn!(owner_id, error = %err, "Feed cache population failed");
        }
    }
}

#[async_trait]
impl TimelineStore for CachedTimelineStore {
    async fn follow(&self, follower_id: &str, followee_id: &str) -> Result<(), RepoError> {
        self.inner.follow(follower_id, followee_id).await?;

        // Backfill just changed the follower's feed.
        self.invalidate(&[follower_id.to_string()]).await;
        Ok(())
    }

    async fn get_followers(&self, user_id: &str) -> Result<Vec<String>, RepoError> {
        self.inner.get_followers(user_id).await
    }

    async fn publish(&self, post: &Post) -> Result<(), RepoError> {
        self.inner.publish(post).await?;

        // Followers are re-read after the publish committed, so this list can differ
        // from the fan-out targets. Snapshots are disposable, so either way is safe.
        let mut owners = match self.inner.get_followers(&post.author_id).await {
            Ok(followers) => followers,
            Err(err) => {
                warn!(
                    author_id = %post.author_id,
                    error = %err,
                    "Could not list followers for cache invalidation"
                );
                Vec::new()
            }
        };
        owners.push(post.author_id.clone());

        self.invalidate(&owners).await;
        Ok(())
    }

    async fn get_feed(&self, user_id: &str, limit: usize) -> Result<Vec<Post>, RepoError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        if let Some(posts) = self.cached(user_id, limit).await {
            counter!(METRIC_FEED_CACHE_HIT).increment(1);
            debug!(user_id, limit, "Feed cache hit");
            return Ok(posts);
        }
        counter!(METRIC_FEED_CACHE_MISS).increment(1);

        let requested = limit.max(self.snapshot_limit);
        let mut posts = self.inner.get_feed(user_id, requested).await?;

        if !posts.is_empty() {
            let snapshot = CachedFeed::from_read(posts.clone(), requested, self.snapshot_limit);
            self.populate(user_id, snapshot).await;
        }

        posts.truncate(limit);
        Ok(posts)
    }
}
