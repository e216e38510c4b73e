use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::QueueConfig;
use crate::db;
use crate::delivery::Deliverer;
use crate::models::{QueueEntry, QueueStatus};

/// What a pass did with a single entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    Completed,
    Requeued,
    Failed,
    /// Another pass claimed the entry first.
    Skipped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub fetched: usize,
    pub completed: usize,
    pub requeued: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl PassSummary {
    fn record(&mut self, outcome: EntryOutcome) {
        match outcome {
            EntryOutcome::Completed => self.completed += 1,
            EntryOutcome::Requeued => self.requeued += 1,
            EntryOutcome::Failed => self.failed += 1,
            EntryOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// Which delivery attempt this is, given `attempts` as it was before the claim.
///
/// Every delivery costs two transitions (the claim, then the outcome), so an
/// entry that has been tried `n` times carries `attempts == 2n`.
pub fn delivery_number(attempts_before_claim: i64) -> i64 {
    attempts_before_claim.max(0) / 2 + 1
}

/// Whether a failure on this delivery attempt should be the last one.
pub fn budget_exhausted(attempts_before_claim: i64, max_retries: u32) -> bool {
    delivery_number(attempts_before_claim) >= i64::from(max_retries)
}

/// Drains the pending pool: claims entries, delivers them and records the outcome.
pub struct Dispatcher {
    pool: SqlitePool,
    deliverer: Arc<Deliverer>,
    settings: QueueConfig,
}

impl Dispatcher {
    pub fn new(pool: SqlitePool, deliverer: Arc<Deliverer>, settings: QueueConfig) -> Self {
        Self {
            pool,
            deliverer,
            settings,
        }
    }

    /// One synchronous pass with the larger manual batch. Returns how many
    /// entries were printed.
    pub async fn process_now(&self) -> Result<usize, sqlx::Error> {
        let summary = self.run_pass(self.settings.manual_batch_limit, None).await?;
        Ok(summary.completed)
    }

    /// Fetch up to `limit` pending entries and process them oldest first.
    ///
    /// Stops early, between entries, once `shutdown` flips to true.
    pub async fn run_pass(
        &self,
        limit: i64,
        shutdown: Option<&watch::Receiver<bool>>,
    ) -> Result<PassSummary, sqlx::Error> {
        let pending = db::print_queue::get_pending(&self.pool, limit).await?;
        let mut summary = PassSummary {
            fetched: pending.len(),
            ..PassSummary::default()
        };

        if pending.is_empty() {
            return Ok(summary);
        }

        tracing::info!("Processing {} pending print requests", pending.len());

        for entry in &pending {
            if shutdown.is_some_and(|rx| *rx.borrow()) {
                tracing::info!("Shutdown requested, leaving the rest of the batch pending");
                break;
            }

            match self.process_entry(entry).await {
                Ok(outcome) => summary.record(outcome),
                Err(e) => {
                    summary.errors += 1;
                    tracing::error!("Failed to update queue entry {}: {e}", entry.id);
                }
            }
        }

        Ok(summary)
    }

    async fn process_entry(&self, entry: &QueueEntry) -> Result<EntryOutcome, sqlx::Error> {
        let claimed = db::print_queue::update_status_if(
            &self.pool,
            entry.id,
            QueueStatus::Pending,
            QueueStatus::Processing,
            None,
        )
        .await?;

        let Some(attempts) = claimed else {
            tracing::debug!("Queue entry {} already claimed elsewhere", entry.id);
            return Ok(EntryOutcome::Skipped);
        };
        let attempts_before_claim = attempts - 1;

        tracing::debug!(
            "Delivering queue entry {} (delivery {}, printer={:?})",
            entry.id,
            delivery_number(attempts_before_claim),
            entry.printer_name
        );

        match self
            .deliverer
            .deliver_payload(&entry.payload, entry.printer_name.as_deref())
            .await
        {
            Ok(device) => {
                db::print_queue::update_status(&self.pool, entry.id, QueueStatus::Completed, None)
                    .await?;
                tracing::info!("Queue entry {} printed on '{device}'", entry.id);
                Ok(EntryOutcome::Completed)
            }
            Err(e) => {
                let delivery = delivery_number(attempts_before_claim);
                if budget_exhausted(attempts_before_claim, self.settings.max_retries) {
                    let message = format!("{e} (gave up after {delivery} attempts)");
                    db::print_queue::update_status(
                        &self.pool,
                        entry.id,
                        QueueStatus::Failed,
                        Some(&message),
                    )
                    .await?;
                    tracing::error!("Queue entry {} failed permanently: {message}", entry.id);
                    Ok(EntryOutcome::Failed)
                } else {
                    let message = e.to_string();
                    db::print_queue::update_status(
                        &self.pool,
                        entry.id,
                        QueueStatus::Pending,
                        Some(&message),
                    )
                    .await?;
                    tracing::warn!(
                        "Queue entry {} failed (attempt {delivery}/{}), will retry: {message}",
                        entry.id,
                        self.settings.max_retries
                    );
                    Ok(EntryOutcome::Requeued)
                }
            }
        }
    }

    /// Return entries a previous process left in PROCESSING to the pending pool.
    ///
    /// Must run before the dispatcher or the HTTP server start, otherwise it
    /// would steal entries that are genuinely in flight.
    pub async fn recover_interrupted(&self) -> Result<usize, sqlx::Error> {
        let stuck = db::print_queue::ids_with_status(&self.pool, QueueStatus::Processing).await?;
        let mut recovered = 0;

        for id in stuck {
            let released = db::print_queue::update_status_if(
                &self.pool,
                id,
                QueueStatus::Processing,
                QueueStatus::Pending,
                Some("interrupted by restart"),
            )
            .await?;
            if released.is_some() {
                recovered += 1;
            }
        }

        if recovered > 0 {
            tracing::warn!("Requeued {recovered} print requests interrupted by a restart");
        }
        Ok(recovered)
    }

    /// Start the background loop on the current Tokio runtime.
    pub fn spawn(self: Arc<Self>) -> DispatcherHandle {
        let (shutdown, rx) = watch::channel(false);
        let task = tokio::spawn(self.run(rx));
        DispatcherHandle { shutdown, task }
    }

    async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            "Queue dispatcher started (every {}s, batch {}, max retries {})",
            self.settings.check_interval.as_secs(),
            self.settings.batch_limit,
            self.settings.max_retries
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            // A full batch that printed cleanly means there is likely more backlog.
            let drain_again = match self.run_pass(self.settings.batch_limit, Some(&shutdown)).await {
                Ok(summary) => {
                    summary.fetched > 0
                        && summary.fetched as i64 >= self.settings.batch_limit
                        && summary.completed == summary.fetched
                }
                Err(e) => {
                    tracing::error!("Queue dispatcher pass failed: {e}");
                    false
                }
            };

            if drain_again {
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.check_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Queue dispatcher stopped");
    }
}

pub struct DispatcherHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl DispatcherHandle {
    /// Signal the loop to stop and wait up to `timeout` for the current entry
    /// to finish. Returns false if the loop was still busy when time ran out.
    pub async fn stop(self, timeout: Duration) -> bool {
        let _ = self.shutdown.send(true);

        match tokio::time::timeout(timeout, self.task).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::error!("Queue dispatcher task ended abnormally: {e}");
                false
            }
            Err(_) => {
                tracing::warn!(
                    "Queue dispatcher did not stop within {}s, leaving it to finish in the background",
                    timeout.as_secs()
                );
                false
            }
        }
    }
}
