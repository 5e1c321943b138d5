use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tracing::{debug, instrument};

use crate::application::deadline::with_deadline;
use crate::application::repos::{RepoError, TimelineStore};
use crate::domain::entities::Post;
use crate::domain::error::DomainError;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Validates new posts and hands them to storage for fan-out.
#[derive(Clone)]
pub struct PublishService {
    store: Arc<dyn TimelineStore>,
    timeout: Option<Duration>,
}

impl PublishService {
    pub fn new(store: Arc<dyn TimelineStore>) -> Self {
        Self {
            store,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Create a post for `author_id` and publish it to every follower's feed.
    ///
    /// Invalid text is rejected before anything reaches storage.
    #[instrument(skip(self, text), fields(text_chars = text.chars().count()))]
    pub async fn publish_post(&self, author_id: &str, text: &str) -> Result<Post, PublishError> {
        let post = Post::new(author_id, text)?;

        with_deadline(self.timeout, "publish", self.store.publish(&post)).await?;

        debug!(post_id = %post.id, author_id, "Post published");
        Ok(post)
    }
}
