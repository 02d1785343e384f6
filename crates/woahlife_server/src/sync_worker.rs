//! Drains the change log into the search index.
//!
//! Events are handled in sequence order. A retryable failure stops the pass
//! and leaves the event pending so later events for the same day cannot
//! overtake it; permanent failures are dead-lettered and the pass continues.
//!
//! A timed-out event keeps running on the blocking pool. Until that task
//! finishes, no pass redelivers it or touches anything after it.

use crate::AppState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use woahlife_core::db::ChangeLogDb;
use woahlife_core::{IndexSync, SyncError, SyncOutcome};

type SyncTask = JoinHandle<Result<SyncOutcome, SyncError>>;

/// Run blocking store/index work off the async runtime, bounded by `timeout`.
///
/// A timeout or a panicked task surfaces as [`SyncError::IndexUnavailable`].
/// A timed-out task is not cancelled.
pub async fn run_blocking<T, F>(timeout: Duration, work: F) -> Result<T, SyncError>
where
    F: FnOnce() -> Result<T, SyncError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(work)).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(SyncError::IndexUnavailable(format!(
            "sync task failed: {}",
            join_err
        ))),
        Err(_) => Err(SyncError::IndexUnavailable(format!(
            "timed out after {} ms",
            timeout.as_millis()
        ))),
    }
}

/// Totals for one drain pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub processed: usize,
    pub dead_lettered: usize,
    /// A retryable failure stopped the pass early.
    pub retry_pending: bool,
}

/// Background task delivering change-log events to the index sync pipeline.
pub struct SyncWorker {
    changes: ChangeLogDb,
    sync: IndexSync,
    notify: Arc<Notify>,
    interval: Duration,
    batch_size: usize,
    io_timeout: Duration,
    /// Index call abandoned by a timed-out pass, with its change sequence.
    stalled: Mutex<Option<(u64, SyncTask)>>,
}

impl SyncWorker {
    /// Build a worker sharing the state's database, pipeline, and wake-up signal.
    pub fn from_state(state: &AppState) -> Self {
        Self {
            changes: state.db.changes.clone(),
            sync: state.sync.clone(),
            notify: state.sync_notify.clone(),
            interval: state.config.sync_interval(),
            batch_size: state.config.sync_batch_size.max(1),
            io_timeout: state.config.io_timeout(),
            stalled: Mutex::new(None),
        }
    }

    /// Spawn the drain loop; it exits once `shutdown` flips to `true` or its sender is dropped.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            "Sync worker started (interval {} ms, batch {})",
            self.interval.as_millis(),
            self.batch_size
        );
        loop {
            if *shutdown.borrow() {
                break;
            }
            loop {
                match self.drain_once().await {
                    // A full batch means more may be waiting.
                    Ok(report)
                        if !report.retry_pending
                            && report.processed + report.dead_lettered >= self.batch_size => {}
                    Ok(_) => break,
                    Err(err) => {
                        tracing::warn!("Sync pass failed: {}", err);
                        break;
                    }
                }
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        tracing::info!("Sync worker stopped");
    }

    /// Process up to one batch of pending events.
    ///
    /// # Errors
    /// Returns an error only when the change log itself cannot be read or updated.
    pub async fn drain_once(&self) -> Result<DrainReport, SyncError> {
        let mut stalled = self.stalled.lock().await;
        if let Some((sequence, mut task)) = stalled.take() {
            match tokio::time::timeout(self.io_timeout, &mut task).await {
                Ok(finished) => {
                    tracing::debug!(
                        "Stalled sync of change {} finished: {:?}",
                        sequence,
                        finished.map(|result| result.is_ok())
                    );
                }
                Err(_) => {
                    tracing::warn!("Change {} is still syncing; holding back the log", sequence);
                    *stalled = Some((sequence, task));
                    return Ok(DrainReport {
                        retry_pending: true,
                        ..DrainReport::default()
                    });
                }
            }
        }

        let changes = self.changes.clone();
        let batch_size = self.batch_size;
        let pending = run_blocking(self.io_timeout, move || {
            changes.pending(batch_size).map_err(SyncError::from)
        })
        .await?;

        let mut report = DrainReport::default();
        for (sequence, event) in pending {
            let sync = self.sync.clone();
            let key = event.key;
            let mut task = tokio::task::spawn_blocking(move || sync.handle_change_event(&event));
            let result = match tokio::time::timeout(self.io_timeout, &mut task).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_err)) => Err(SyncError::IndexUnavailable(format!(
                    "sync task failed: {}",
                    join_err
                ))),
                Err(_) => {
                    *stalled = Some((sequence, task));
                    Err(SyncError::IndexUnavailable(format!(
                        "timed out after {} ms",
                        self.io_timeout.as_millis()
                    )))
                }
            };

            match result {
                Ok(outcome) => {
                    tracing::debug!("Change {} for {} synced: {:?}", sequence, key, outcome);
                    let changes = self.changes.clone();
                    run_blocking(self.io_timeout, move || {
                        changes.ack(sequence).map_err(SyncError::from)
                    })
                    .await?;
                    report.processed += 1;
                }
                Err(err) if err.is_retryable() => {
                    tracing::warn!(
                        "Change {} for {} will be retried: {}",
                        sequence,
                        key,
                        err
                    );
                    report.retry_pending = true;
                    break;
                }
                Err(err) => {
                    tracing::error!(
                        "Change {} for {} rejected permanently: {}",
                        sequence,
                        key,
                        err
                    );
                    let changes = self.changes.clone();
                    let reason = err.to_string();
                    run_blocking(self.io_timeout, move || {
                        changes
                            .dead_letter(sequence, &reason)
                            .map_err(SyncError::from)
                    })
                    .await?;
                    report.dead_lettered += 1;
                }
            }
        }
        Ok(report)
    }
}
