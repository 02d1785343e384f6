//! Error types for storage, the entry write path, the payload cipher, and index sync.
use thiserror::Error;

/// Storage and domain error shared by the redb-backed collaborators.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] redb::Error),

    #[error("Storage error: {0}")]
    StorageMessage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Document encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found")]
    NotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Record {object_id} is {size} bytes; index limit is {limit}")]
    RecordTooLarge {
        object_id: String,
        size: usize,
        limit: usize,
    },

    #[error("Internal server error")]
    Internal,
}

impl From<redb::DatabaseError> for AppError {
    fn from(value: redb::DatabaseError) -> Self {
        Self::Database(value.into())
    }
}

impl From<redb::TransactionError> for AppError {
    fn from(value: redb::TransactionError) -> Self {
        Self::Database(value.into())
    }
}

impl From<redb::TableError> for AppError {
    fn from(value: redb::TableError) -> Self {
        Self::Database(value.into())
    }
}

impl From<redb::StorageError> for AppError {
    fn from(value: redb::StorageError) -> Self {
        Self::Database(value.into())
    }
}

impl From<redb::CommitError> for AppError {
    fn from(value: redb::CommitError) -> Self {
        Self::Database(value.into())
    }
}

/// Failures of the envelope cipher. Both are fatal to the payload being processed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    #[error("Master key unavailable: {0}")]
    KeyUnavailable(String),

    #[error("Decryption failed: {0}")]
    DecryptFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptFailed(String),
}

/// Failures of the entry write path.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Journal store unavailable: {0}")]
    StoreUnavailable(#[source] AppError),

    #[error("Invalid date key {0}; expected a calendar date as YYYYMMDD")]
    InvalidDateKey(u32),

    #[error("Entry text is empty")]
    EmptyEntry,

    #[error("Entry exceeds maximum of {max} bytes")]
    EntryTooLarge { max: usize },

    #[error(transparent)]
    Cipher(#[from] CipherError),
}

impl From<AppError> for WriteError {
    fn from(value: AppError) -> Self {
        Self::StoreUnavailable(value)
    }
}

/// Failures of the index sync pipeline.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Malformed change event: {0}")]
    MalformedEvent(String),

    #[error("Search document {object_id} is {size} bytes; limit is {limit}")]
    DocumentTooLarge {
        object_id: String,
        size: usize,
        limit: usize,
    },

    #[error("Search index unavailable: {0}")]
    IndexUnavailable(String),

    #[error(transparent)]
    Cipher(#[from] CipherError),
}

impl SyncError {
    /// Whether redelivering the same event may succeed.
    ///
    /// Contract violations and oversize documents fail identically on every
    /// replay; index outages and key-service outages do not.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::MalformedEvent(_) | SyncError::DocumentTooLarge { .. } => false,
            SyncError::IndexUnavailable(_) => true,
            SyncError::Cipher(CipherError::KeyUnavailable(_)) => true,
            SyncError::Cipher(_) => false,
        }
    }
}

impl From<AppError> for SyncError {
    fn from(value: AppError) -> Self {
        match value {
            AppError::RecordTooLarge {
                object_id,
                size,
                limit,
            } => Self::DocumentTooLarge {
                object_id,
                size,
                limit,
            },
            other => Self::IndexUnavailable(other.to_string()),
        }
    }
}
