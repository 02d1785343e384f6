//! HTTP request handlers.

/// Journal entry, search, and export endpoints.
pub mod entry;
/// Externally produced change events.
pub mod event;

use crate::error::HttpError;
use axum::http::StatusCode;
use std::time::Duration;

/// Run blocking store, cipher, or index work off the async runtime.
///
/// The request gives up after `timeout` with 503 so the client can retry;
/// the blocking work itself still runs to completion.
pub(crate) async fn run_bounded<T, F>(timeout: Duration, work: F) -> Result<T, HttpError>
where
    F: FnOnce() -> Result<T, HttpError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(work)).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => {
            tracing::error!("Request task failed: {}", join_err);
            Err(HttpError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
            ))
        }
        Err(_) => {
            tracing::warn!("Request timed out after {} ms", timeout.as_millis());
            Err(HttpError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                format!("Timed out after {} ms", timeout.as_millis()),
            ))
        }
    }
}
