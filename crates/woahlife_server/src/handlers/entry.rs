//! Journal entry HTTP handlers.

use super::run_bounded;
use crate::{error::HttpError, AppState};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use woahlife_core::maintenance;
use woahlife_core::models::{
    CreateEntryRequest, DateKey, EntryWriteResponse, SearchDocument, SearchQuery,
};
use woahlife_core::query::normalized_limit;
use woahlife_core::AppError;

fn today() -> Result<DateKey, HttpError> {
    DateKey::from_date(chrono::Local::now().date_naive()).map_err(|err| {
        HttpError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Local date is outside the journal range: {}", err),
        )
    })
}

/// Append an entry to a day, creating the day's record on first write.
///
/// Responds once the journal store write succeeds; the search index catches
/// up asynchronously.
///
/// # Errors
/// Returns 400 for invalid dates or empty text, 413 for oversize text, and
/// 503 when the store or master key is unavailable or the write times out.
pub async fn create_entry(
    State(state): State<AppState>,
    Json(req): Json<CreateEntryRequest>,
) -> Result<Json<EntryWriteResponse>, HttpError> {
    let key = match req.date {
        Some(raw) => DateKey::new(raw).map_err(|err| {
            HttpError::from(woahlife_core::WriteError::InvalidDateKey(err.0))
        })?,
        None => today()?,
    };

    let writer = state.writer.clone();
    let outcome = run_bounded(state.config.io_timeout(), move || {
        Ok(writer.append_to_day(key, &req.text)?)
    })
    .await?;
    state.sync_notify.notify_one();

    Ok(Json(EntryWriteResponse {
        date: key.value(),
        created: outcome.created,
        entry_count: outcome.entry_count,
    }))
}

/// Fetch the indexed document for one day.
///
/// # Errors
/// Returns 404 when nothing is indexed under `id`.
pub async fn get_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SearchDocument>, HttpError> {
    let query = state.query.clone();
    run_bounded(state.config.io_timeout(), move || Ok(query.get_by_id(&id)?))
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound.into())
}

/// Ranked full-text search over indexed days.
pub async fn search_entries(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<SearchDocument>>, HttpError> {
    let limit = normalized_limit(query.limit);
    let path = state.query.clone();
    let results = run_bounded(state.config.io_timeout(), move || {
        Ok(path.search(&query.q, limit)?)
    })
    .await?;
    Ok(Json(results))
}

/// Plain-text export of one year straight from the journal store.
///
/// # Errors
/// Returns 400 for years outside the date-key range and 503 when the master
/// key is unavailable or the store times out.
pub async fn export_year(
    State(state): State<AppState>,
    Path(year): Path<i32>,
) -> Result<impl IntoResponse, HttpError> {
    let store = state.store.clone();
    let cipher = state.cipher.clone();
    let body = run_bounded(state.config.io_timeout(), move || {
        Ok(maintenance::export_year(store.as_ref(), cipher.as_ref(), year)?)
    })
    .await?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    ))
}
