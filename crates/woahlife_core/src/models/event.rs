//! Change notifications for journal store mutations.

use super::entry::{DateKey, EntryPayload};
use serde::{Deserialize, Serialize};

/// Kind of store mutation, named after the stream records the service consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "INSERT", alias = "CREATE")]
    Create,
    #[serde(rename = "MODIFY", alias = "UPDATE")]
    Update,
    #[serde(rename = "REMOVE", alias = "DELETE")]
    Remove,
}

/// Full value of a record after a create or update.
///
/// `entries` is optional because upstream records may exist before anything
/// indexable has been written to them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordImage {
    #[serde(default)]
    pub entries: Option<Vec<EntryPayload>>,
}

/// One change to the journal store, delivered at-least-once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    #[serde(rename = "eventName")]
    pub kind: EventKind,
    pub key: DateKey,
    #[serde(rename = "newImage", default)]
    pub new_value: Option<RecordImage>,
}

impl ChangeEvent {
    /// Event for a record created with `entries`.
    pub fn created(key: DateKey, entries: Vec<EntryPayload>) -> Self {
        Self::with_entries(EventKind::Create, key, entries)
    }

    /// Event for a record whose entries were replaced or appended to.
    pub fn updated(key: DateKey, entries: Vec<EntryPayload>) -> Self {
        Self::with_entries(EventKind::Update, key, entries)
    }

    /// Event for a deleted record.
    pub fn removed(key: DateKey) -> Self {
        Self {
            kind: EventKind::Remove,
            key,
            new_value: None,
        }
    }

    fn with_entries(kind: EventKind, key: DateKey, entries: Vec<EntryPayload>) -> Self {
        Self {
            kind,
            key,
            new_value: Some(RecordImage {
                entries: Some(entries),
            }),
        }
    }

    /// Decode an externally produced event from its JSON wire form.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
