//! Storage layer for woahlife: the journal store, its change log, and the
//! local search index, all in one redb file.

/// Change-log (transactional outbox) access.
pub mod changes;
/// Journal store backed by redb.
pub mod entry;
/// Local search index backed by redb.
pub mod index;
/// Table definitions.
pub mod tables;

pub use changes::{ChangeLogDb, DeadLetter};
pub use entry::EntryDb;
pub use index::IndexDb;

use crate::constants::DEFAULT_MAX_DOCUMENT_BYTES;
use crate::error::AppError;
use crate::models::{AppendOutcome, DateKey, EntryPayload, JournalRecord, SearchDocument};
use std::path::Path;
use std::sync::Arc;

/// Durable per-day journal storage.
///
/// Every mutation is published as a [`crate::models::ChangeEvent`] carrying
/// the full new value of the record.
pub trait JournalStore: Send + Sync {
    /// Read the record for `key`; absence is a normal outcome.
    fn get(&self, key: DateKey) -> Result<Option<JournalRecord>, AppError>;

    /// Create or fully overwrite the record for `key`.
    fn put(&self, key: DateKey, entries: Vec<EntryPayload>) -> Result<(), AppError>;

    /// Append `entries` to an existing record.
    ///
    /// # Errors
    /// Returns [`AppError::NotFound`] when no record exists for `key`.
    fn append(&self, key: DateKey, entries: Vec<EntryPayload>) -> Result<usize, AppError>;

    /// Append to the record for `key`, creating it when absent, as one atomic write.
    fn append_or_create(
        &self,
        key: DateKey,
        entry: EntryPayload,
    ) -> Result<AppendOutcome, AppError>;

    /// Remove the record for `key`. Returns whether a record existed.
    fn delete(&self, key: DateKey) -> Result<bool, AppError>;

    /// Keys with a record, ascending, limited to the inclusive bounds given.
    fn list_keys(
        &self,
        from: Option<DateKey>,
        to: Option<DateKey>,
    ) -> Result<Vec<DateKey>, AppError>;
}

/// Document store queried by the read path.
pub trait SearchIndex: Send + Sync {
    /// Insert or replace `document` by its `object_id`.
    fn save(&self, document: &SearchDocument) -> Result<(), AppError>;

    /// Remove a document; deleting an absent id succeeds.
    fn delete(&self, object_id: &str) -> Result<(), AppError>;

    /// Point lookup by id.
    fn get(&self, object_id: &str) -> Result<Option<SearchDocument>, AppError>;

    /// Relevance-ranked free-text query, most relevant first.
    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchDocument>, AppError>;
}

/// Handle over the redb file with accessors for each table group.
pub struct Database {
    pub db: Arc<redb::Database>,
    pub entries: EntryDb,
    pub changes: ChangeLogDb,
    pub index: IndexDb,
}

impl Database {
    /// Open (or create) the database in directory `path` with the default
    /// index document ceiling.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created or redb cannot open
    /// the file (including when another process holds it).
    pub fn new(path: &str) -> Result<Self, AppError> {
        Self::open(path, DEFAULT_MAX_DOCUMENT_BYTES)
    }

    /// Open the database with an explicit index document ceiling in bytes.
    ///
    /// # Errors
    /// See [`Database::new`].
    pub fn open(path: &str, max_document_bytes: usize) -> Result<Self, AppError> {
        std::fs::create_dir_all(path).map_err(|err| {
            AppError::StorageMessage(format!("Failed to create data directory '{}': {}", path, err))
        })?;
        let file = Path::new(path).join(tables::REDB_FILE_NAME);

        let db = match redb::Database::create(&file) {
            Ok(db) => Arc::new(db),
            Err(redb::DatabaseError::DatabaseAlreadyOpen) => {
                return Err(AppError::StorageMessage(format!(
                    "Database at '{}' is already open in another woahlife process.\n\
                    Stop it first, or set DB_PATH to use a different database location.",
                    file.display()
                )));
            }
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            entries: EntryDb::new(db.clone())?,
            changes: ChangeLogDb::new(db.clone())?,
            index: IndexDb::new(db.clone(), max_document_bytes)?,
            db,
        })
    }
}

#[cfg(test)]
mod tests;
