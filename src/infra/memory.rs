//! Volatile timeline storage for tests and local development.
//!
//! All state lives in one [`State`] value behind a single reader/writer lock. Writers
//! (`follow`, `publish`) take the write lock for their whole unit of work, so each is
//! atomic with respect to every other call; readers share the read lock.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::application::repos::{BACKFILL_LIMIT, RepoError, TimelineStore};
use crate::domain::entities::{FeedEntry, FollowEdge, Post};
use crate::util::lock::{rw_read, rw_write};

const SOURCE: &str = "infra::memory";

#[derive(Default)]
struct State {
    users: HashSet<String>,
    edges: HashSet<FollowEdge>,
    // followee -> followers
    followers: HashMap<String, HashSet<String>>,
    posts: HashMap<Uuid, Post>,
    posts_by_author: HashMap<String, Vec<Uuid>>,
    feeds: HashMap<String, Vec<FeedEntry>>,
    feed_keys: HashSet<(String, Uuid)>,
}

impl State {
    fn ensure_user(&mut self, user_id: &str) {
        if !self.users.contains(user_id) {
            self.users.insert(user_id.to_string());
        }
    }

    /// Returns false when the entry already existed.
    fn insert_feed_entry(&mut self, entry: FeedEntry) -> bool {
        if !self
            .feed_keys
            .insert((entry.owner_id.clone(), entry.post_id))
        {
            return false;
        }
        self.feeds
            .entry(entry.owner_id.clone())
            .or_default()
            .push(entry);
        true
    }

    fn recent_posts_by(&self, author_id: &str, limit: usize) -> Vec<Post> {
        let mut posts: Vec<Post> = self
            .posts_by_author
            .get(author_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.posts.get(id).cloned())
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        posts.truncate(limit);
        posts
    }
}

#[derive(Default)]
pub struct InMemoryTimelineStore {
    state: RwLock<State>,
}

impl InMemoryTimelineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct follow edges recorded.
    pub fn edge_count(&self) -> usize {
        rw_read(&self.state, SOURCE, "edge_count").edges.len()
    }

    /// Number of feed entries owned by `user_id`, including entries beyond any page size.
    pub fn feed_len(&self, user_id: &str) -> usize {
        rw_read(&self.state, SOURCE, "feed_len")
            .feeds
            .get(user_id)
            .map_or(0, Vec::len)
    }

    /// Number of stored posts across all authors.
    pub fn post_count(&self) -> usize {
        rw_read(&self.state, SOURCE, "post_count").posts.len()
    }
}

#[async_trait]
impl TimelineStore for InMemoryTimelineStore {
    async fn follow(&self, follower_id: &str, followee_id: &str) -> Result<(), RepoError> {
        let mut state = rw_write(&self.state, SOURCE, "follow");

        state.ensure_user(follower_id);
        state.ensure_user(followee_id);

        let edge = FollowEdge::new(follower_id, followee_id);
        if state.edges.insert(edge) {
            state
                .followers
                .entry(followee_id.to_string())
                .or_default()
                .insert(follower_id.to_string());
        }

        let mut backfilled = 0usize;
        for post in state.recent_posts_by(followee_id, BACKFILL_LIMIT) {
            if state.insert_feed_entry(FeedEntry::for_post(follower_id, &post)) {
                backfilled += 1;
            }
        }

        debug!(follower_id, followee_id, backfilled, "Follow stored in memory");
        Ok(())
    }

    async fn get_followers(&self, user_id: &str) -> Result<Vec<String>, RepoError> {
        let state = rw_read(&self.state, SOURCE, "get_followers");
        Ok(state
            .followers
            .get(user_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn publish(&self, post: &Post) -> Result<(), RepoError> {
        let mut state = rw_write(&self.state, SOURCE, "publish");

        if state.posts.contains_key(&post.id) {
            return Err(RepoError::Duplicate {
                constraint: "posts_pkey".to_string(),
            });
        }

        state.ensure_user(&post.author_id);
        state.posts.insert(post.id, post.clone());
        state
            .posts_by_author
            .entry(post.author_id.clone())
            .or_default()
            .push(post.id);

        let mut targets: Vec<String> = state
            .followers
            .get(&post.author_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        targets.push(post.author_id.clone());

        for owner in &targets {
            state.insert_feed_entry(FeedEntry::for_post(owner.as_str(), post));
        }

        debug!(
            post_id = %post.id,
            author_id = %post.author_id,
            targets = targets.len(),
            "Post fanned out in memory"
        );
        Ok(())
    }

    async fn get_feed(&self, user_id: &str, limit: usize) -> Result<Vec<Post>, RepoError> {
        let state = rw_read(&self.state, SOURCE, "get_feed");

        let Some(entries) = state.feeds.get(user_id) else {
            return Ok(Vec::new());
        };

        let mut ordered: Vec<&FeedEntry> = entries.iter().collect();
        // Stable: entries with equal timestamps keep insertion order across calls.
        ordered.sort_by(|a, b| b.post_created_at.cmp(&a.post_created_at));

        Ok(ordered
            .into_iter()
            .take(limit)
            .filter_map(|entry| state.posts.get(&entry.post_id).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use time::{Duration, OffsetDateTime};

    use super::*;

    fn post_at(author: &str, text: &str, seconds: i64) -> Post {
        Post {
            id: Uuid::new_v4(),
            author_id: author.to_string(),
            text: text.to_string(),
            created_at: OffsetDateTime::UNIX_EPOCH + Duration::seconds(seconds),
        }
    }

    fn texts(posts: &[Post]) -> Vec<&str> {
        posts.iter().map(|post| post.text.as_str()).collect()
    }

    #[tokio::test]
    async fn author_sees_own_post() {
        let store = InMemoryTimelineStore::new();
        store.publish(&post_at("b", "mine", 1)).await.unwrap();

        let feed = store.get_feed("b", 50).await.unwrap();
        assert_eq!(texts(&feed), ["mine"]);
    }

    #[tokio::test]
    async fn unknown_user_has_empty_feed() {
        let store = InMemoryTimelineStore::new();
        assert!(store.get_feed("ghost", 50).await.unwrap().is_empty());
        assert!(store.get_followers("ghost").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_post_id_is_rejected() {
        let store = InMemoryTimelineStore::new();
        let post = post_at("b", "once", 1);
        store.publish(&post).await.unwrap();

        let err = store.publish(&post).await.unwrap_err();
        assert!(matches!(err, RepoError::Duplicate { .. }));
        assert_eq!(store.feed_len("b"), 1);
    }

    #[tokio::test]
    async fn equal_timestamps_keep_a_stable_order() {
        let store = InMemoryTimelineStore::new();
        store.publish(&post_at("b", "first", 5)).await.unwrap();
        store.publish(&post_at("b", "second", 5)).await.unwrap();
        store.publish(&post_at("b", "third", 5)).await.unwrap();

        let once = store.get_feed("b", 10).await.unwrap();
        let twice = store.get_feed("b", 10).await.unwrap();
        assert_eq!(texts(&once), ["first", "second", "third"]);
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn backfill_is_capped_to_most_recent_posts() {
        let store = InMemoryTimelineStore::new();
        for i in 0..(BACKFILL_LIMIT as i64 + 10) {
            store
                .publish(&post_at("b", &format!("p{i}"), i))
                .await
                .unwrap();
        }

        store.follow("a", "b").await.unwrap();

        assert_eq!(store.feed_len("a"), BACKFILL_LIMIT);
        let feed = store.get_feed("a", 100).await.unwrap();
        assert_eq!(feed.first().map(|p| p.text.as_str()), Some("p59"));
        assert_eq!(feed.last().map(|p| p.text.as_str()), Some("p10"));
    }

    #[tokio::test]
    async fn posts_are_visible_in_follower_feed_without_duplicates() {
        let store = InMemoryTimelineStore::new();
        store.follow("a", "b").await.unwrap();
        store.publish(&post_at("b", "hi", 1)).await.unwrap();
        store.follow("a", "b").await.unwrap();

        assert_eq!(store.edge_count(), 1);
        assert_eq!(store.feed_len("a"), 1);
        assert_eq!(store.get_followers("b").await.unwrap(), ["a"]);
    }
}
