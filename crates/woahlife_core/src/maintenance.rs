//! Whole-store sweeps run from the server's maintenance flags.
//!
//! Each sweep walks the store one record at a time. A record rewritten by a
//! sweep publishes an update event like any other write, so the index catches
//! up through the normal sync path.

use crate::cipher::PayloadCipher;
use crate::db::{ChangeLogDb, JournalStore};
use crate::error::{AppError, CipherError, SyncError, WriteError};
use crate::models::{ChangeEvent, DateKey, EntryPayload};
use crate::sync::{IndexSync, SyncOutcome};
use chrono::NaiveDate;

const UNREADABLE_ENTRY: &str = "[unreadable entry]";

/// Totals for one index rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildReport {
    /// Documents written to the index.
    pub indexed: usize,
    /// Records whose document exceeded the size ceiling.
    pub skipped_too_large: usize,
    /// Entries left out because they could not be decrypted.
    pub skipped_entries: usize,
}

/// Strip quoted-printable leftovers from mail-imported text.
pub fn clean_legacy_text(text: &str) -> String {
    text.replace("=E2=80=99", "'").replace("= ", "")
}

/// Encrypt every plaintext entry still in the store.
///
/// # Returns
/// Number of records rewritten.
///
/// # Errors
/// Stops at the first store or cipher failure; records already rewritten stay rewritten.
pub fn encrypt_unencrypted_entries(
    store: &dyn JournalStore,
    cipher: &dyn PayloadCipher,
) -> Result<usize, WriteError> {
    let mut rewritten = 0;
    for key in store.list_keys(None, None)? {
        let Some(record) = store.get(key)? else {
            continue;
        };
        if !record.has_plaintext() {
            continue;
        }
        let sealed = record
            .entries
            .iter()
            .map(|entry| match entry {
                EntryPayload::Plaintext(text) => cipher.seal_text(text),
                EntryPayload::Encrypted(_) => Ok(entry.clone()),
            })
            .collect::<Result<Vec<_>, CipherError>>()?;
        store.put(key, sealed)?;
        tracing::info!("Encrypted plaintext entries of record {}", key);
        rewritten += 1;
    }
    Ok(rewritten)
}

/// Normalize legacy encoding artifacts in every entry.
///
/// Encrypted entries keep their encryption; they are only resealed when the
/// cleaned text differs. An entry that cannot be decrypted is kept as-is.
///
/// # Returns
/// Number of records rewritten.
///
/// # Errors
/// Stops at the first store failure, or when the master key is unavailable.
pub fn cleanup_entries(
    store: &dyn JournalStore,
    cipher: &dyn PayloadCipher,
) -> Result<usize, WriteError> {
    let mut rewritten = 0;
    for key in store.list_keys(None, None)? {
        let Some(record) = store.get(key)? else {
            continue;
        };
        let mut changed = false;
        let mut cleaned = Vec::with_capacity(record.entries.len());
        for (position, entry) in record.entries.into_iter().enumerate() {
            let text = match cipher.open_payload(&entry) {
                Ok(text) => text,
                Err(CipherError::DecryptFailed(reason)) => {
                    tracing::warn!(
                        "Leaving entry {} of record {} untouched: {}",
                        position,
                        key,
                        reason
                    );
                    cleaned.push(entry);
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            let fixed = clean_legacy_text(&text);
            if fixed == text {
                cleaned.push(entry);
                continue;
            }
            changed = true;
            cleaned.push(if entry.is_encrypted() {
                cipher.seal_text(&fixed)?
            } else {
                EntryPayload::Plaintext(fixed)
            });
        }
        if changed {
            store.put(key, cleaned)?;
            tracing::info!("Cleaned legacy text in record {}", key);
            rewritten += 1;
        }
    }
    Ok(rewritten)
}

/// Re-derive every search document from the store.
///
/// Oversize documents are logged and counted rather than aborting the run.
///
/// # Errors
/// Returns the first store read failure as [`SyncError::IndexUnavailable`],
/// and any retryable sync failure as-is.
pub fn rebuild_index(
    store: &dyn JournalStore,
    pipeline: &IndexSync,
) -> Result<RebuildReport, SyncError> {
    let mut report = RebuildReport::default();
    for key in store.list_keys(None, None)? {
        let Some(record) = store.get(key)? else {
            continue;
        };
        match pipeline.sync_record(&record) {
            Ok(SyncOutcome::Indexed {
                skipped_entries, ..
            }) => {
                report.indexed += 1;
                report.skipped_entries += skipped_entries;
            }
            Ok(_) => {}
            Err(SyncError::DocumentTooLarge { size, limit, .. }) => {
                tracing::warn!(
                    "Record {} renders to {} bytes (limit {}); not indexed",
                    key,
                    size,
                    limit
                );
                report.skipped_too_large += 1;
            }
            Err(err) => return Err(err),
        }
    }
    tracing::info!(
        "Rebuilt search index: {} indexed, {} too large, {} entries unreadable",
        report.indexed,
        report.skipped_too_large,
        report.skipped_entries
    );
    Ok(report)
}

/// Send every dead-lettered day back through the sync path.
///
/// Each day gets one new event built from its current record, or a remove
/// event when the record is gone.
///
/// # Returns
/// Number of days requeued.
///
/// # Errors
/// Returns the first store or change-log failure; the dead letters are kept.
pub fn requeue_dead_letters(
    store: &dyn JournalStore,
    changes: &ChangeLogDb,
) -> Result<usize, AppError> {
    let requeued = changes.requeue_dead_letters(|key| {
        Ok(match store.get(key)? {
            Some(record) => ChangeEvent::updated(key, record.entries),
            None => ChangeEvent::removed(key),
        })
    })?;
    if requeued > 0 {
        tracing::info!("Requeued {} dead-lettered day(s)", requeued);
    }
    Ok(requeued)
}

/// Plain-text export of one calendar year.
///
/// Each day with a record renders as its `YYYY-MM-DD` line followed by each
/// entry and a blank line.
///
/// # Errors
/// - [`WriteError::InvalidDateKey`] when `year` is outside the key range.
/// - [`WriteError::Cipher`] when the master key is unavailable.
/// - [`WriteError::StoreUnavailable`] on read failure.
pub fn export_year(
    store: &dyn JournalStore,
    cipher: &dyn PayloadCipher,
    year: i32,
) -> Result<String, WriteError> {
    let (from, to) = year_bounds(year)?;
    let mut out = String::new();
    for key in store.list_keys(Some(from), Some(to))? {
        let Some(record) = store.get(key)? else {
            continue;
        };
        out.push_str(&key.iso());
        out.push('\n');
        for entry in &record.entries {
            match cipher.open_payload(entry) {
                Ok(text) => out.push_str(&text),
                Err(CipherError::DecryptFailed(reason)) => {
                    tracing::warn!("Entry of record {} is unreadable: {}", key, reason);
                    out.push_str(UNREADABLE_ENTRY);
                }
                Err(err) => return Err(err.into()),
            }
            out.push_str("\n\n");
        }
    }
    Ok(out)
}

fn year_bounds(year: i32) -> Result<(DateKey, DateKey), WriteError> {
    let invalid = || {
        let raw = u32::try_from(year)
            .ok()
            .and_then(|year| year.checked_mul(10_000))
            .and_then(|raw| raw.checked_add(101))
            .unwrap_or(0);
        WriteError::InvalidDateKey(raw)
    };
    let first = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(invalid)?;
    let last = NaiveDate::from_ymd_opt(year, 12, 31).ok_or_else(invalid)?;
    let from = DateKey::from_date(first).map_err(|err| WriteError::InvalidDateKey(err.0))?;
    let to = DateKey::from_date(last).map_err(|err| WriteError::InvalidDateKey(err.0))?;
    Ok((from, to))
}
