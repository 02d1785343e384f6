//! Core domain library for woahlife (config, storage, cipher, index sync).

/// Envelope encryption for entry payloads.
pub mod cipher;
/// Configuration loading and defaults.
pub mod config;
/// Shared constants.
pub mod constants;
/// Database access layer (journal store, search index, change log).
pub mod db;
/// Process-global environment helpers.
pub mod env;
/// Application error types (storage/domain).
pub mod error;
/// Bulk sweeps over the journal store.
pub mod maintenance;
/// Data models for records, events, and search documents.
pub mod models;
/// Read side over the search index.
pub mod query;
/// Index sync pipeline and entry write path.
pub mod sync;

#[cfg(test)]
pub(crate) mod test_support;

pub use cipher::{EnvelopeCipher, KeyProvider, PayloadCipher};
pub use config::Config;
pub use constants::{DEFAULT_MAX_DOCUMENT_BYTES, DEFAULT_PORT};
pub use db::{Database, JournalStore, SearchIndex};
pub use error::{AppError, CipherError, SyncError, WriteError};
pub use query::QueryPath;
pub use sync::{EntryWriter, IndexSync, SyncOutcome};
