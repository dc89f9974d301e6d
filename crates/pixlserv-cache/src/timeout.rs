use std::future::Future;
use std::time::Duration;

use crate::error::{CacheError, Result};
use crate::key::CacheKey;

/// Run one store round-trip, failing with [`CacheError::Timeout`] after `limit`
pub(crate) async fn bounded<T, F>(
    operation: &'static str,
    key: &CacheKey,
    limit: Duration,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(CacheError::Timeout {
            operation,
            key: key.path().to_string(),
        }),
    }
}
