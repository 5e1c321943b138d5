use thiserror::Error;

use crate::application::{follow::FollowError, publish::PublishError, timeline::FeedError};
use crate::domain::error::DomainError;
use crate::infra::error::InfraError;

/// Top-level error for the `murmur` binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Process exit code for this error. Caller mistakes exit with 2 so scripts can
    /// tell them apart from infrastructure failures.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Domain(DomainError::ContentTooLong { .. })
            | AppError::Domain(DomainError::SelfFollowNotAllowed) => 2,
            AppError::Domain(DomainError::Invariant { .. })
            | AppError::Infra(_)
            | AppError::Storage(_)
            | AppError::Unexpected(_) => 1,
        }
    }
}

impl From<PublishError> for AppError {
    fn from(error: PublishError) -> Self {
        match error {
            PublishError::Domain(err) => AppError::Domain(err),
            PublishError::Repo(err) => AppError::Storage(err.to_string()),
        }
    }
}

impl From<FollowError> for AppError {
    fn from(error: FollowError) -> Self {
        match error {
            FollowError::Domain(err) => AppError::Domain(err),
            FollowError::Repo(err) => AppError::Storage(err.to_string()),
        }
    }
}

impl From<FeedError> for AppError {
    fn from(error: FeedError) -> Self {
        match error {
            FeedError::Repo(err) => AppError::Storage(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::repos::RepoError;

    #[test]
    fn validation_errors_are_surfaced_verbatim() {
        let error = AppError::from(FollowError::Domain(DomainError::SelfFollowNotAllowed));
        assert_eq!(error.to_string(), "a user cannot follow themselves");
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn storage_errors_are_generic_failures() {
        let error = AppError::from(FeedError::Repo(RepoError::Timeout));
        assert_eq!(error.to_string(), "storage error: database timeout");
        assert_eq!(error.exit_code(), 1);
    }
}
