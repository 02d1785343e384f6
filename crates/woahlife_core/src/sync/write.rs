//! Get-or-create-then-append writes against the journal store.

use crate::cipher::PayloadCipher;
use crate::db::JournalStore;
use crate::error::WriteError;
use crate::models::{AppendOutcome, DateKey, EntryPayload};
use std::sync::Arc;

/// Appends entries to the day they belong to.
///
/// Index synchronization is not awaited: the change event produced by the
/// store is consumed later by [`crate::sync::IndexSync`].
#[derive(Clone)]
pub struct EntryWriter {
    store: Arc<dyn JournalStore>,
    cipher: Option<Arc<dyn PayloadCipher>>,
    max_entry_size: usize,
}

impl EntryWriter {
    /// Build a writer over `store`.
    ///
    /// # Arguments
    /// - `store`: Journal store to mutate.
    /// - `cipher`: When present, entries are encrypted before they are stored.
    /// - `max_entry_size`: Largest accepted entry text, in bytes.
    pub fn new(
        store: Arc<dyn JournalStore>,
        cipher: Option<Arc<dyn PayloadCipher>>,
        max_entry_size: usize,
    ) -> Self {
        Self {
            store,
            cipher,
            max_entry_size,
        }
    }

    /// Append `plaintext` to the record for a raw `YYYYMMDD` key.
    ///
    /// # Errors
    /// - [`WriteError::InvalidDateKey`] when `date_key` is not a calendar day.
    /// - See [`EntryWriter::append_to_day`] for the remaining cases.
    pub fn append_entry(&self, date_key: u32, plaintext: &str) -> Result<AppendOutcome, WriteError> {
        let key = DateKey::new(date_key).map_err(|err| WriteError::InvalidDateKey(err.0))?;
        self.append_to_day(key, plaintext)
    }

    /// Append `plaintext` to the record for `key`, creating the record on the
    /// first write of the day.
    ///
    /// # Returns
    /// Whether the record was created and how many entries it now holds.
    ///
    /// # Errors
    /// - [`WriteError::EmptyEntry`] for blank text.
    /// - [`WriteError::EntryTooLarge`] above the configured size.
    /// - [`WriteError::Cipher`] when encryption is enabled and fails.
    /// - [`WriteError::StoreUnavailable`] when the store write fails; nothing is written.
    pub fn append_to_day(&self, key: DateKey, plaintext: &str) -> Result<AppendOutcome, WriteError> {
        if plaintext.trim().is_empty() {
            return Err(WriteError::EmptyEntry);
        }
        if plaintext.len() > self.max_entry_size {
            return Err(WriteError::EntryTooLarge {
                max: self.max_entry_size,
            });
        }

        let payload = match &self.cipher {
            Some(cipher) => cipher.seal_text(plaintext)?,
            None => EntryPayload::Plaintext(plaintext.to_string()),
        };

        let outcome = self.store.append_or_create(key, payload)?;
        if outcome.created {
            tracing::info!("Created journal record {}", key);
        } else {
            tracing::info!(
                "Appended entry {} to journal record {}",
                outcome.entry_count,
                key
            );
        }
        Ok(outcome)
    }
}
