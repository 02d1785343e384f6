//! Change events produced outside this process.

use crate::{error::HttpError, sync_worker::run_blocking, AppState};
use axum::{body::Bytes, extract::State, Json};
use woahlife_core::models::ChangeEvent;
use woahlife_core::{SyncError, SyncOutcome};

/// Run one stream-style change event through the index sync pipeline.
///
/// The body is decoded by hand so shape errors surface as malformed events
/// rather than extractor rejections.
///
/// # Errors
/// Returns 400 for malformed events, 413 for oversize documents, and 503 when
/// the index or master key is unavailable (the caller should redeliver).
pub async fn ingest_event(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SyncOutcome>, HttpError> {
    let event = ChangeEvent::from_json(&body)
        .map_err(|err| SyncError::MalformedEvent(err.to_string()))?;
    tracing::debug!("Received {:?} event for {}", event.kind, event.key);

    let sync = state.sync.clone();
    let outcome = run_blocking(state.config.io_timeout(), move || {
        sync.handle_change_event(&event)
    })
    .await?;
    Ok(Json(outcome))
}
