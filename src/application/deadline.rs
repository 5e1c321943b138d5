use std::{future::Future, time::Duration};

use tracing::warn;

use crate::application::repos::RepoError;

/// Run a storage call under an optional deadline.
///
/// On expiry the storage future is dropped. The durable backend's open transaction is
/// dropped with it and rolls back, so a timed-out call never leaves partial writes.
pub(crate) async fn with_deadline<T, F>(
    timeout: Option<Duration>,
    op: &'static str,
    call: F,
) -> Result<T, RepoError>
where
    F: Future<Output = Result<T, RepoError>>,
{
    let Some(limit) = timeout else {
        return call.await;
    };

    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                op,
                timeout_ms = limit.as_millis() as u64,
                "Storage call exceeded its deadline"
            );
            Err(RepoError::Timeout)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_through_without_deadline() {
        let value = with_deadline(None, "test", async { Ok::<_, RepoError>(7) })
            .await
            .expect("no deadline");
        assert_eq!(value, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_deadline_reports_timeout() {
        let result = with_deadline(Some(Duration::from_millis(10)), "test", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, RepoError>(())
        })
        .await;

        assert!(matches!(result, Err(RepoError::Timeout)));
    }
}
