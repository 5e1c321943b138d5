//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::Post;

/// Number of the followee's most recent posts copied into a new follower's feed.
pub const BACKFILL_LIMIT: usize = 50;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Storage contract shared by the volatile, durable and cache-aside backends.
///
/// Every implementation must keep the same feed invariants: a post reaches its
/// author's feed and the feed of every user following the author at publish time,
/// and a new follower receives the followee's most recent [`BACKFILL_LIMIT`] posts.
/// Feed inserts are idempotent on `(owner, post)`.
#[async_trait]
pub trait TimelineStore: Send + Sync {
    /// Record `follower_id → followee_id` and backfill the follower's feed in one
    /// unit of work. Re-following is a no-op.
    async fn follow(&self, follower_id: &str, followee_id: &str) -> Result<(), RepoError>;

    /// Users currently following `user_id`, in no particular order.
    async fn get_followers(&self, user_id: &str) -> Result<Vec<String>, RepoError>;

    /// Persist `post` and fan it out to the author and every follower.
    ///
    /// Once the post itself is stored, a failure while fanning out to followers is
    /// logged by the backend and does not fail the call.
    async fn publish(&self, post: &Post) -> Result<(), RepoError>;

    /// Up to `limit` posts from `user_id`'s feed, newest first.
    async fn get_feed(&self, user_id: &str, limit: usize) -> Result<Vec<Post>, RepoError>;
}
