use std::{future::Future, time::Duration};

use crate::error::AppError;

/// Runs a store-bound future under `limit`.
///
/// Expiry is reported as `ServiceUnavailable` so callers can retry.
/// The inner future is dropped on expiry, which rolls back any open transaction.
pub async fn with_deadline<T, F>(limit: Duration, fut: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::ServiceUnavailable(format!(
            "store operation exceeded {} ms",
            limit.as_millis()
        ))),
    }
}
