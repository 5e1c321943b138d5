//! Feed cache.
//!
//! Holds short-lived snapshots of the head of each owner's feed in front of any
//! [`TimelineStore`](crate::application::repos::TimelineStore). Snapshots live either
//! in-process or in Redis:
//!
//! ```toml
//! [cache]
//! enabled = true
//! store = "redis"
//! redis_url = "redis://127.0.0.1:6379"
//! ttl_seconds = 120
//! ```

mod config;
mod decorator;
mod redis_store;
mod store;

pub use config::{CacheConfig, CacheStoreKind};
pub use decorator::{
    CachedTimelineStore, METRIC_FEED_CACHE_ERROR, METRIC_FEED_CACHE_HIT,
    METRIC_FEED_CACHE_INVALIDATE, METRIC_FEED_CACHE_MISS, METRIC_FEED_CACHE_POPULATE_FAILED,
};
pub use redis_store::RedisFeedCache;
pub use store::{CacheError, CachedFeed, FeedCache, MemoryFeedCache};
