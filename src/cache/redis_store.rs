//! Redis-backed feed snapshots, shared by every process pointed at the same instance.
//!
//! Keys follow `timeline:{owner_id}` and hold the JSON-encoded [`CachedFeed`]. Expiry is
//! delegated to Redis via `SET … EX`. Responses and reconnects are bounded by the same
//! timeout the decorator applies, so a stalled server surfaces as an error.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::{debug, warn};

use super::store::{CacheError, CachedFeed, FeedCache};

const KEY_PREFIX: &str = "timeline:";
const RECONNECT_BACKOFF_BASE: u64 = 2;
const RECONNECT_BACKOFF_FACTOR_MS: u64 = 100;
const RECONNECT_RETRIES: usize = 6;

fn feed_key(owner_id: &str) -> String {
    format!("{KEY_PREFIX}{owner_id}")
}

#[derive(Clone)]
pub struct RedisFeedCache {
    manager: ConnectionManager,
    ttl_secs: u64,
}

impl RedisFeedCache {
    pub async fn connect(
        url: &str,
        ttl: Duration,
        op_timeout: Duration,
    ) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(CacheError::backend)?;
        let manager = ConnectionManager::new_with_backoff_and_timeouts(
            client,
            RECONNECT_BACKOFF_BASE,
            RECONNECT_BACKOFF_FACTOR_MS,
            RECONNECT_RETRIES,
            op_timeout,
            op_timeout,
        )
        .await
        .map_err(CacheError::backend)?;

        Ok(Self {
            manager,
            ttl_secs: ttl.as_secs().max(1),
        })
    }

    pub async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|err| {
                warn!(error = %err, "Redis PING failed");
                CacheError::backend(err)
            })?;
        Ok(())
    }
}

#[async_trait]
impl FeedCache for RedisFeedCache {
    async fn get(&self, owner_id: &str) -> Result<Option<CachedFeed>, CacheError> {
        let key = feed_key(owner_id);
        let mut conn = self.manager.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .map_err(CacheError::backend)?;

        match value {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, owner_id: &str, feed: CachedFeed) -> Result<(), CacheError> {
        let key = feed_key(owner_id);
        let json = serde_json::to_string(&feed)?;
        let mut conn = self.manager.clone();
        let _: () = redis::cmd("SET")
            .arg(&key)
            .arg(json)
            .arg("EX")
            .arg(self.ttl_secs)
            .query_async(&mut conn)
            .await
            .map_err(CacheError::backend)?;

        debug!(key = %key, ttl_secs = self.ttl_secs, "Cached feed snapshot");
        Ok(())
    }

    async fn invalidate(&self, owner_id: &str) -> Result<(), CacheError> {
        let key = feed_key(owner_id);
        let mut conn = self.manager.clone();
        let _: i64 = redis::cmd("DEL")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .map_err(CacheError::backend)?;
        Ok(())
    }
}
