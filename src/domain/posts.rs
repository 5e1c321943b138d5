//! Post creation and content rules.

use std::sync::atomic::{AtomicI64, Ordering};

use time::OffsetDateTime;
use uuid::Uuid;

use super::entities::Post;
use super::error::DomainError;

/// Maximum post length, counted in characters rather than bytes.
pub const MAX_POST_CHARS: usize = 280;

static LAST_ISSUED_MICROS: AtomicI64 = AtomicI64::new(i64::MIN);

impl Post {
    /// Validate `text` and mint a new post with a fresh id and creation timestamp.
    ///
    /// Only the length rule is enforced here. Empty text is accepted and the author is
    /// not looked up; storage registers unknown authors on publish.
    pub fn new(author_id: impl Into<String>, text: impl Into<String>) -> Result<Self, DomainError> {
        let text = text.into();
        let length = text.chars().count();
        if length > MAX_POST_CHARS {
            return Err(DomainError::content_too_long(length, MAX_POST_CHARS));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            author_id: author_id.into(),
            text,
            created_at: next_timestamp()?,
        })
    }
}

/// Issue a creation timestamp for a new post.
///
/// Timestamps have microsecond resolution (the durable store's precision), are rounded
/// up so they never precede the wall clock at the time of the call, and are strictly
/// increasing within the process so feed ordering never depends on a tie-break.
pub fn next_timestamp() -> Result<OffsetDateTime, DomainError> {
    let now_nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    let now_micros = i64::try_from((now_nanos + 999) / 1_000)
        .map_err(|_| DomainError::invariant("system clock is outside the supported range"))?;

    let step = |last: i64| now_micros.max(last.saturating_add(1));
    let previous = LAST_ISSUED_MICROS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(step(last)))
        .unwrap_or_else(|current| current);
    let issued = step(previous);

    OffsetDateTime::from_unix_timestamp_nanos(i128::from(issued) * 1_000)
        .map_err(|err| DomainError::invariant(format!("invalid post timestamp: {err}")))
}
