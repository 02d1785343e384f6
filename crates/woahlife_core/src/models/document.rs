//! Denormalized search documents derived from journal records.

use super::entry::DateKey;
use serde::{Deserialize, Serialize};

/// Index representation of one journal day.
///
/// Field names are the index wire contract and must not change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchDocument {
    #[serde(rename = "objectID")]
    pub object_id: String,
    pub date: i64,
    #[serde(rename = "prettyDate")]
    pub pretty_date: String,
    pub entries: Vec<String>,
}

impl SearchDocument {
    /// Assemble the document for `key` from already-decrypted entry text.
    ///
    /// Every derived field is a function of `key`, so replays of the same
    /// record always produce the same document.
    pub fn for_day(key: DateKey, entries: Vec<String>) -> Self {
        Self {
            object_id: key.object_id(),
            date: key.timestamp(),
            pretty_date: key.pretty(),
            entries,
        }
    }

    /// Serialized form sent to the index.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
