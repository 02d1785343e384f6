//! Keeps the search index consistent with the journal store.
//!
//! The transform from record to document is pure: replays of an event yield
//! byte-identical documents, so redelivery only causes a redundant upsert.

use crate::cipher::PayloadCipher;
use crate::db::SearchIndex;
use crate::error::{CipherError, SyncError};
use crate::models::{ChangeEvent, DateKey, EntryPayload, EventKind, JournalRecord, SearchDocument};
use serde::Serialize;
use std::sync::Arc;

/// What handling one change event did to the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// The document was upserted. `skipped_entries` counts entries left out
    /// because they could not be decrypted.
    Indexed {
        object_id: String,
        skipped_entries: usize,
    },
    /// The document was removed (or was already absent).
    Deleted { object_id: String },
    /// The record had nothing indexable; the index was not touched.
    Unchanged,
}

/// Index sync pipeline over injected index and cipher handles.
#[derive(Clone)]
pub struct IndexSync {
    index: Arc<dyn SearchIndex>,
    cipher: Arc<dyn PayloadCipher>,
    max_document_bytes: usize,
}

impl IndexSync {
    /// Build a pipeline.
    ///
    /// # Arguments
    /// - `index`: Search index receiving upserts and deletes.
    /// - `cipher`: Cipher for binary-tagged entries.
    /// - `max_document_bytes`: Ceiling on the serialized document size.
    pub fn new(
        index: Arc<dyn SearchIndex>,
        cipher: Arc<dyn PayloadCipher>,
        max_document_bytes: usize,
    ) -> Self {
        Self {
            index,
            cipher,
            max_document_bytes,
        }
    }

    /// Apply one change event to the search index.
    ///
    /// # Errors
    /// - [`SyncError::MalformedEvent`] for a non-remove event without a new value.
    /// - [`SyncError::DocumentTooLarge`] when the document exceeds the ceiling;
    ///   the index is not called.
    /// - [`SyncError::Cipher`] when the master key cannot be resolved.
    /// - [`SyncError::IndexUnavailable`] when the index call fails.
    pub fn handle_change_event(&self, event: &ChangeEvent) -> Result<SyncOutcome, SyncError> {
        let object_id = event.key.object_id();
        match (event.kind, &event.new_value) {
            (EventKind::Remove, _) => {
                self.index.delete(&object_id)?;
                tracing::info!("Removed search document {}", object_id);
                Ok(SyncOutcome::Deleted { object_id })
            }
            (kind, None) => Err(SyncError::MalformedEvent(format!(
                "{:?} event for {} carries no new value",
                kind, event.key
            ))),
            (_, Some(image)) => match &image.entries {
                None => {
                    tracing::debug!("Record {} has no entries yet; nothing to index", event.key);
                    Ok(SyncOutcome::Unchanged)
                }
                Some(entries) => self.upsert(event.key, entries),
            },
        }
    }

    /// Index a record read straight from the store.
    ///
    /// # Errors
    /// Same as the create/update path of [`IndexSync::handle_change_event`].
    pub fn sync_record(&self, record: &JournalRecord) -> Result<SyncOutcome, SyncError> {
        self.upsert(record.date_key, &record.entries)
    }

    /// Assemble the search document for `key` without touching the index.
    ///
    /// # Returns
    /// The document and the number of entries skipped as undecryptable.
    ///
    /// # Errors
    /// Returns [`SyncError::Cipher`] for failures other than a per-entry
    /// decrypt failure.
    pub fn build_document(
        &self,
        key: DateKey,
        entries: &[EntryPayload],
    ) -> Result<(SearchDocument, usize), SyncError> {
        let mut texts = Vec::with_capacity(entries.len());
        let mut skipped = 0;
        for (position, entry) in entries.iter().enumerate() {
            match self.cipher.open_payload(entry) {
                Ok(text) => texts.push(text),
                Err(CipherError::DecryptFailed(reason)) => {
                    tracing::warn!(
                        "Skipping entry {} of record {}: {}",
                        position,
                        key,
                        reason
                    );
                    skipped += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok((SearchDocument::for_day(key, texts), skipped))
    }

    fn upsert(&self, key: DateKey, entries: &[EntryPayload]) -> Result<SyncOutcome, SyncError> {
        let (document, skipped_entries) = self.build_document(key, entries)?;
        let size = document
            .encode()
            .map_err(|err| SyncError::MalformedEvent(format!("unencodable document: {}", err)))?
            .len();
        if size > self.max_document_bytes {
            return Err(SyncError::DocumentTooLarge {
                object_id: document.object_id,
                size,
                limit: self.max_document_bytes,
            });
        }

        self.index.save(&document)?;
        tracing::info!(
            "Indexed search document {} ({} entries, {} bytes)",
            document.object_id,
            document.entries.len(),
            size
        );
        Ok(SyncOutcome::Indexed {
            object_id: document.object_id,
            skipped_entries,
        })
    }
}
