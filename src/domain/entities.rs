//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A published post. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: String,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Directed follower → followee relationship.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FollowEdge {
    pub follower_id: String,
    pub followee_id: String,
}

impl FollowEdge {
    pub fn new(follower_id: impl Into<String>, followee_id: impl Into<String>) -> Self {
        Self {
            follower_id: follower_id.into(),
            followee_id: followee_id.into(),
        }
    }
}

/// Materialized feed row. `post_created_at` duplicates the post timestamp so feeds
/// can be ordered without joining back to the post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub owner_id: String,
    pub post_id: Uuid,
    pub post_created_at: OffsetDateTime,
}

impl FeedEntry {
    pub fn for_post(owner_id: impl Into<String>, post: &Post) -> Self {
        Self {
            owner_id: owner_id.into(),
            post_id: post.id,
            post_created_at: post.created_at,
        }
    }
}
