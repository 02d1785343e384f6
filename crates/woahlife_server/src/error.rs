//! HTTP error mapping for API handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use woahlife_core::error::{AppError, CipherError, SyncError, WriteError};

/// JSON error response: `{ "error": "..." }` with a status code.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<AppError> for HttpError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::NotFound => Self::new(StatusCode::NOT_FOUND, "Not found"),
            AppError::BadRequest(msg) => Self::new(StatusCode::BAD_REQUEST, msg),
            AppError::RecordTooLarge { .. } => {
                Self::new(StatusCode::PAYLOAD_TOO_LARGE, err.to_string())
            }
            AppError::StorageMessage(msg) => {
                tracing::error!("Storage error: {}", msg);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Database error")
            }
            other => {
                tracing::error!("Internal error: {:?}", other);
                Self::internal()
            }
        }
    }
}

fn from_cipher(err: CipherError) -> HttpError {
    match err {
        CipherError::KeyUnavailable(reason) => {
            tracing::error!("Master key unavailable: {}", reason);
            HttpError::new(StatusCode::SERVICE_UNAVAILABLE, "Encryption key unavailable")
        }
        other => {
            tracing::error!("Cipher error: {}", other);
            HttpError::internal()
        }
    }
}

impl From<WriteError> for HttpError {
    fn from(err: WriteError) -> Self {
        match err {
            WriteError::InvalidDateKey(_) | WriteError::EmptyEntry => {
                Self::new(StatusCode::BAD_REQUEST, err.to_string())
            }
            WriteError::EntryTooLarge { .. } => {
                Self::new(StatusCode::PAYLOAD_TOO_LARGE, err.to_string())
            }
            WriteError::Cipher(inner) => from_cipher(inner),
            WriteError::StoreUnavailable(inner) => {
                tracing::error!("Journal store unavailable: {}", inner);
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "Journal store unavailable")
            }
        }
    }
}

impl From<SyncError> for HttpError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::MalformedEvent(_) => Self::new(StatusCode::BAD_REQUEST, err.to_string()),
            SyncError::DocumentTooLarge { .. } => {
                tracing::warn!("{}", err);
                Self::new(StatusCode::PAYLOAD_TOO_LARGE, err.to_string())
            }
            SyncError::IndexUnavailable(reason) => {
                tracing::warn!("Search index unavailable: {}", reason);
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "Search index unavailable")
            }
            SyncError::Cipher(inner) => from_cipher(inner),
        }
    }
}
