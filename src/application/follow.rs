use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tracing::{debug, instrument};

use crate::application::deadline::with_deadline;
use crate::application::repos::{RepoError, TimelineStore};
use crate::domain::error::DomainError;

#[derive(Debug, Error)]
pub enum FollowError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Owns the follow relationship rules. Storage performs the edge insert and the
/// backfill of the follower's feed as one unit of work.
#[derive(Clone)]
pub struct FollowService {
    store: Arc<dyn TimelineStore>,
    timeout: Option<Duration>,
}

impl FollowService {
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

    #[instrument(skip(self))]
    pub async fn follow_user(&self, follower_id: &str, followee_id: &str) -> Result<(), FollowError> {
        if follower_id == followee_id {
            return Err(DomainError::SelfFollowNotAllowed.into());
        }

        with_deadline(
            self.timeout,
            "follow",
            self.store.follow(follower_id, followee_id),
        )
        .await?;

        debug!(follower_id, followee_id, "Follow recorded");
        Ok(())
    }

    pub async fn followers(&self, user_id: &str) -> Result<Vec<String>, FollowError> {
        with_deadline(self.timeout, "get_followers", self.store.get_followers(user_id))
            .await
            .map_err(FollowError::from)
    }
}
