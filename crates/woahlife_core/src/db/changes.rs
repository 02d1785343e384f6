//! Change log written in the same transaction as each journal mutation.
//!
//! Events stay in the log until a consumer acknowledges them, which gives
//! at-least-once delivery across crashes and failed sync attempts.

use crate::{
    db::tables::*,
    error::AppError,
    models::{ChangeEvent, DateKey},
};
use redb::{ReadableDatabase, ReadableTable, ReadableTableMetadata, WriteTransaction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Event that failed permanently, kept for inspection instead of replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub event: ChangeEvent,
    pub reason: String,
}

/// Append `event` to the change log inside an open write transaction.
///
/// # Returns
/// The sequence number assigned to the event.
pub(crate) fn record_change(
    write_txn: &WriteTransaction,
    event: &ChangeEvent,
) -> Result<u64, AppError> {
    let encoded = bincode::serialize(event)?;
    let mut state = write_txn.open_table(CHANGE_LOG_STATE)?;
    let mut log = write_txn.open_table(CHANGE_LOG)?;

    let sequence = state
        .get(NEXT_SEQUENCE_KEY)?
        .map(|guard| guard.value())
        .unwrap_or(1);
    log.insert(sequence, encoded.as_slice())?;
    state.insert(NEXT_SEQUENCE_KEY, sequence + 1)?;
    Ok(sequence)
}

/// Accessor for the change-log tables.
#[derive(Clone)]
pub struct ChangeLogDb {
    db: Arc<redb::Database>,
}

impl ChangeLogDb {
    /// Initialize change-log tables if they do not exist yet.
    ///
    /// # Errors
    /// Returns an error when redb transaction/table initialization fails.
    pub fn new(db: Arc<redb::Database>) -> Result<Self, AppError> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(CHANGE_LOG)?;
        write_txn.open_table(CHANGE_DEAD_LETTERS)?;
        write_txn.open_table(CHANGE_LOG_STATE)?;
        write_txn.commit()?;
        Ok(Self { db })
    }

    /// Publish an event that did not originate from a local store mutation.
    ///
    /// # Returns
    /// The sequence number assigned to the event.
    pub fn publish(&self, event: &ChangeEvent) -> Result<u64, AppError> {
        let write_txn = self.db.begin_write()?;
        let sequence = record_change(&write_txn, event)?;
        write_txn.commit()?;
        Ok(sequence)
    }

    /// Oldest unacknowledged events, in sequence order.
    ///
    /// # Errors
    /// Returns an error when storage access or deserialization fails.
    pub fn pending(&self, limit: usize) -> Result<Vec<(u64, ChangeEvent)>, AppError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let read_txn = self.db.begin_read()?;
        let log = read_txn.open_table(CHANGE_LOG)?;
        let mut events = Vec::with_capacity(limit);
        for item in log.iter()? {
            let (sequence, value) = item?;
            events.push((sequence.value(), bincode::deserialize(value.value())?));
            if events.len() >= limit {
                break;
            }
        }
        Ok(events)
    }

    /// Number of unacknowledged events.
    pub fn pending_count(&self) -> Result<u64, AppError> {
        let read_txn = self.db.begin_read()?;
        let log = read_txn.open_table(CHANGE_LOG)?;
        Ok(log.len()?)
    }

    /// Acknowledge a processed event.
    ///
    /// # Returns
    /// `true` when the event was still pending.
    pub fn ack(&self, sequence: u64) -> Result<bool, AppError> {
        let write_txn = self.db.begin_write()?;
        let mut log = write_txn.open_table(CHANGE_LOG)?;
        let removed = log.remove(sequence)?.is_some();
        drop(log);
        write_txn.commit()?;
        Ok(removed)
    }

    /// Move a pending event to the dead-letter table with `reason`.
    ///
    /// # Returns
    /// `true` when the event was pending and has been moved.
    pub fn dead_letter(&self, sequence: u64, reason: &str) -> Result<bool, AppError> {
        let write_txn = self.db.begin_write()?;
        let moved = {
            let mut log = write_txn.open_table(CHANGE_LOG)?;
            let mut dead = write_txn.open_table(CHANGE_DEAD_LETTERS)?;
            let Some(guard) = log.remove(sequence)? else {
                return Ok(false);
            };
            let event: ChangeEvent = bincode::deserialize(guard.value())?;
            drop(guard);
            let letter = DeadLetter {
                event,
                reason: reason.to_string(),
            };
            let encoded = bincode::serialize(&letter)?;
            dead.insert(sequence, encoded.as_slice())?;
            true
        };
        write_txn.commit()?;
        Ok(moved)
    }

    /// Replace every dead letter with a fresh event for its day.
    ///
    /// `refresh` builds the event from the day's current state, so a requeued
    /// day cannot roll the index back to the value it had when it failed.
    /// Days with several dead letters are requeued once.
    ///
    /// # Returns
    /// Number of days requeued.
    ///
    /// # Errors
    /// Returns the first storage or `refresh` failure; nothing is requeued then.
    pub fn requeue_dead_letters<F>(&self, mut refresh: F) -> Result<usize, AppError>
    where
        F: FnMut(DateKey) -> Result<ChangeEvent, AppError>,
    {
        let write_txn = self.db.begin_write()?;
        let days = {
            let mut dead = write_txn.open_table(CHANGE_DEAD_LETTERS)?;
            let mut sequences = Vec::new();
            let mut days = BTreeSet::new();
            for item in dead.iter()? {
                let (sequence, value) = item?;
                let letter: DeadLetter = bincode::deserialize(value.value())?;
                sequences.push(sequence.value());
                days.insert(letter.event.key);
            }
            for sequence in sequences {
                let _ = dead.remove(sequence)?;
            }
            days
        };
        for day in &days {
            record_change(&write_txn, &refresh(*day)?)?;
        }
        write_txn.commit()?;
        Ok(days.len())
    }

    /// Drop every dead letter.
    ///
    /// # Returns
    /// Number of dead letters removed.
    pub fn purge_dead_letters(&self) -> Result<usize, AppError> {
        let write_txn = self.db.begin_write()?;
        let mut dead = write_txn.open_table(CHANGE_DEAD_LETTERS)?;
        let mut sequences = Vec::new();
        for item in dead.iter()? {
            let (sequence, _) = item?;
            sequences.push(sequence.value());
        }
        for sequence in &sequences {
            let _ = dead.remove(*sequence)?;
        }
        drop(dead);
        write_txn.commit()?;
        Ok(sequences.len())
    }

    /// Dead-lettered events, oldest first.
    pub fn dead_letters(&self, limit: usize) -> Result<Vec<(u64, DeadLetter)>, AppError> {
        let read_txn = self.db.begin_read()?;
        let dead = read_txn.open_table(CHANGE_DEAD_LETTERS)?;
        let mut letters = Vec::new();
        for item in dead.iter()? {
            if letters.len() >= limit {
                break;
            }
            let (sequence, value) = item?;
            letters.push((sequence.value(), bincode::deserialize(value.value())?));
        }
        Ok(letters)
    }
}
