//! redb table definitions shared by storage modules.

use redb::TableDefinition;

/// File name for the redb database within the configured DB directory.
pub const REDB_FILE_NAME: &str = "data.redb";

/// Journal records: `YYYYMMDD` -> bincode `Vec<EntryPayload>`.
pub const JOURNAL_ENTRIES: TableDefinition<u32, &[u8]> = TableDefinition::new("journal_entries");

/// Pending change events: sequence -> bincode `ChangeEvent`.
pub const CHANGE_LOG: TableDefinition<u64, &[u8]> = TableDefinition::new("change_log");
/// Permanently rejected change events: sequence -> bincode `DeadLetter`.
pub const CHANGE_DEAD_LETTERS: TableDefinition<u64, &[u8]> =
    TableDefinition::new("change_dead_letters");
/// Change-log counters.
pub const CHANGE_LOG_STATE: TableDefinition<&str, u64> = TableDefinition::new("change_log_state");
/// Key in [`CHANGE_LOG_STATE`] holding the next sequence number.
pub const NEXT_SEQUENCE_KEY: &str = "next_sequence";

/// Search documents: `objectID` -> JSON `SearchDocument`.
pub const SEARCH_DOCUMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("search_documents");
