//! Journal store backed by redb.

use super::changes::record_change;
use super::JournalStore;
use crate::{db::tables::*, error::AppError, models::*};
use redb::{ReadableDatabase, ReadableTable};
use std::sync::Arc;

fn decode_entries(bytes: &[u8]) -> Result<Vec<EntryPayload>, AppError> {
    Ok(bincode::deserialize(bytes)?)
}

/// Accessor for the journal record table.
#[derive(Clone)]
pub struct EntryDb {
    db: Arc<redb::Database>,
}

impl EntryDb {
    /// Initialize the journal table if it does not exist yet.
    ///
    /// # Errors
    /// Returns an error when redb transaction/table initialization fails.
    pub fn new(db: Arc<redb::Database>) -> Result<Self, AppError> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(JOURNAL_ENTRIES)?;
        write_txn.commit()?;
        Ok(Self { db })
    }

    /// Number of stored day records.
    pub fn count(&self) -> Result<u64, AppError> {
        use redb::ReadableTableMetadata;
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(JOURNAL_ENTRIES)?;
        Ok(table.len()?)
    }
}

impl JournalStore for EntryDb {
    fn get(&self, key: DateKey) -> Result<Option<JournalRecord>, AppError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(JOURNAL_ENTRIES)?;
        match table.get(key.value())? {
            Some(value) => Ok(Some(JournalRecord::new(key, decode_entries(value.value())?))),
            None => Ok(None),
        }
    }

    fn put(&self, key: DateKey, entries: Vec<EntryPayload>) -> Result<(), AppError> {
        let encoded = bincode::serialize(&entries)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(JOURNAL_ENTRIES)?;
            let existed = table.insert(key.value(), encoded.as_slice())?.is_some();
            let event = if existed {
                ChangeEvent::updated(key, entries)
            } else {
                ChangeEvent::created(key, entries)
            };
            record_change(&write_txn, &event)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn append(&self, key: DateKey, entries: Vec<EntryPayload>) -> Result<usize, AppError> {
        let write_txn = self.db.begin_write()?;
        let entry_count = {
            let mut table = write_txn.open_table(JOURNAL_ENTRIES)?;
            let mut current = match table.get(key.value())? {
                Some(value) => decode_entries(value.value())?,
                None => return Err(AppError::NotFound),
            };
            current.extend(entries);
            let encoded = bincode::serialize(&current)?;
            table.insert(key.value(), encoded.as_slice())?;
            let entry_count = current.len();
            record_change(&write_txn, &ChangeEvent::updated(key, current))?;
            entry_count
        };
        write_txn.commit()?;
        Ok(entry_count)
    }

    fn append_or_create(
        &self,
        key: DateKey,
        entry: EntryPayload,
    ) -> Result<AppendOutcome, AppError> {
        let write_txn = self.db.begin_write()?;
        let outcome = {
            let mut table = write_txn.open_table(JOURNAL_ENTRIES)?;
            let existing = match table.get(key.value())? {
                Some(value) => Some(decode_entries(value.value())?),
                None => None,
            };
            let created = existing.is_none();
            let mut entries = existing.unwrap_or_default();
            entries.push(entry);

            let encoded = bincode::serialize(&entries)?;
            table.insert(key.value(), encoded.as_slice())?;
            let outcome = AppendOutcome {
                created,
                entry_count: entries.len(),
            };
            let event = if created {
                ChangeEvent::created(key, entries)
            } else {
                ChangeEvent::updated(key, entries)
            };
            record_change(&write_txn, &event)?;
            outcome
        };
        write_txn.commit()?;
        Ok(outcome)
    }

    fn delete(&self, key: DateKey) -> Result<bool, AppError> {
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(JOURNAL_ENTRIES)?;
            let existed = table.remove(key.value())?.is_some();
            if existed {
                record_change(&write_txn, &ChangeEvent::removed(key))?;
            }
            existed
        };
        write_txn.commit()?;
        Ok(existed)
    }

    fn list_keys(
        &self,
        from: Option<DateKey>,
        to: Option<DateKey>,
    ) -> Result<Vec<DateKey>, AppError> {
        let lower = from.map(DateKey::value).unwrap_or(u32::MIN);
        let upper = to.map(DateKey::value).unwrap_or(u32::MAX);
        if lower > upper {
            return Ok(Vec::new());
        }

        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(JOURNAL_ENTRIES)?;
        let mut keys = Vec::new();
        for item in table.range(lower..=upper)? {
            let (key, _) = item?;
            match DateKey::new(key.value()) {
                Ok(key) => keys.push(key),
                Err(err) => tracing::warn!("Skipping journal row with {}", err),
            }
        }
        Ok(keys)
    }
}
