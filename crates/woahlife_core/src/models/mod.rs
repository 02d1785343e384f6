//! Data models shared by storage, sync, and the HTTP API.

/// Derived search documents.
pub mod document;
/// Journal records, date keys, and entry payloads.
pub mod entry;
/// Change events emitted by the journal store.
pub mod event;

pub use document::SearchDocument;
pub use entry::{AppendOutcome, DateKey, EntryPayload, InvalidDateKey, JournalRecord};
pub use event::{ChangeEvent, EventKind, RecordImage};

use serde::{Deserialize, Serialize};

/// Request payload for appending an entry.
#[derive(Debug, Deserialize, Serialize)]
pub struct CreateEntryRequest {
    /// Target day as `YYYYMMDD`; the server's current day when omitted.
    pub date: Option<u32>,
    pub text: String,
}

/// Acknowledgement returned once the journal store write succeeds.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct EntryWriteResponse {
    pub date: u32,
    pub created: bool,
    pub entry_count: usize,
}

/// Query parameters for searching entries.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub limit: Option<usize>,
}
