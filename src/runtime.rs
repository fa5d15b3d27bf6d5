//! Running synchronous pipeline calls from async code.

use std::time::Duration;

use crate::error::{RetrievalError, RetrievalResult};

/// Run `f` on tokio's blocking pool and wait at most `timeout` for it.
///
/// On timeout the caller gets [`RetrievalError::Timeout`]; the blocking task
/// itself cannot be interrupted and finishes in the background.
pub async fn run_blocking<T, F>(timeout: Duration, f: F) -> RetrievalResult<T>
where
    F: FnOnce() -> RetrievalResult<T> + Send + 'static,
    T: Send + 'static,
{
    let handle = tokio::task::spawn_blocking(f);
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(RetrievalError::Task(join_error.to_string())),
        Err(_) => {
            tracing::warn!(target: "retrieval", "operation exceeded {timeout:?}");
            Err(RetrievalError::Timeout(timeout))
        }
    }
}
