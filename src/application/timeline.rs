use std::{sync::Arc, time::Duration};

use thiserror::Error;

use crate::application::deadline::with_deadline;
use crate::application::repos::{RepoError, TimelineStore};
use crate::domain::entities::Post;

/// Page size used by [`TimelineService::get_feed`].
pub const DEFAULT_PAGE_SIZE: usize = 50;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Read side of the timeline: bounded, newest-first feeds.
#[derive(Clone)]
pub struct TimelineService {
    store: Arc<dyn TimelineStore>,
    timeout: Option<Duration>,
}

impl TimelineService {
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

    pub async fn get_feed(&self, user_id: &str) -> Result<Vec<Post>, FeedError> {
        self.get_feed_page(user_id, DEFAULT_PAGE_SIZE).await
    }

    pub async fn get_feed_page(&self, user_id: &str, limit: usize) -> Result<Vec<Post>, FeedError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        with_deadline(self.timeout, "get_feed", self.store.get_feed(user_id, limit))
            .await
            .map_err(FeedError::from)
    }
}
