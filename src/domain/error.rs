use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("post text is {length} characters long; the limit is {max}")]
    ContentTooLong { length: usize, max: usize },
    #[error("a user cannot follow themselves")]
    SelfFollowNotAllowed,
    #[error("domain invariant violated: {message}")]
    Invariant { message: String },
}

impl DomainError {
    pub fn content_too_long(length: usize, max: usize) -> Self {
        Self::ContentTooLong { length, max }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
        }
    }
}
