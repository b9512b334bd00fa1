//! Documentation Driver
//!
//! The driver is an external collaborator that writes documentation for one
//! entity at a time. [`DriverRunner`] pulls pending entries, dispatches them
//! with bounded concurrency and writes each outcome back to the store.
//!
//! - Each attempt gets its own timeout
//! - Cancellation is cooperative, through a `watch` channel
//! - A timed-out or cancelled attempt leaves the entry `Pending`: neither is
//!   evidence that documentation failed
//! - A driver error marks the entry `Error` and lands in the gap log

pub mod command;

pub use command::CommandDriver;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::config::DriverConfig;
use crate::constants::driver::{DEFAULT_BATCH_SIZE, DEFAULT_CONCURRENCY, DEFAULT_TIMEOUT_SECS};
use crate::storage::{Actor, ManifestStore};
use crate::types::{IdentityKey, LedgerError, ManifestEntry, Outcome, Result};

#[async_trait]
pub trait DocumentationDriver: Send + Sync {
    fn name(&self) -> &str;

    /// Produce documentation for one entity and report how it went
    async fn document(&self, entry: &ManifestEntry) -> Result<Outcome>;
}

/// Sender side of a runner's cancellation signal
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        // No receivers left means nothing to cancel
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Create a linked cancel handle and receiver
pub fn cancellation() -> (CancelHandle, watch::Receiver<bool>) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx: Arc::new(tx) }, rx)
}

async fn wait_cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender gone: cancellation can no longer happen
            std::future::pending::<()>().await;
        }
    }
}

/// What happened to one dispatched entry
#[derive(Debug)]
enum Attempt {
    Finished(Outcome),
    TimedOut,
    Cancelled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub attempted: usize,
    pub documented: usize,
    pub errors: usize,
    pub manual_review: usize,
    pub timed_out: usize,
    pub cancelled: usize,
    /// Outcomes refused because the entry left `Pending` meanwhile
    pub rejected: usize,
}

impl DispatchSummary {
    fn merge(&mut self, other: &DispatchSummary) {
        self.attempted += other.attempted;
        self.documented += other.documented;
        self.errors += other.errors;
        self.manual_review += other.manual_review;
        self.timed_out += other.timed_out;
        self.cancelled += other.cancelled;
        self.rejected += other.rejected;
    }
}

pub struct DriverRunner {
    store: Arc<ManifestStore>,
    driver: Arc<dyn DocumentationDriver>,
    concurrency: usize,
    batch_size: usize,
    timeout: Duration,
    cancel: watch::Receiver<bool>,
}

impl DriverRunner {
    pub fn new(store: Arc<ManifestStore>, driver: Arc<dyn DocumentationDriver>) -> Self {
        // Sender dropped right away: a runner without a handle is never cancelled
        let (_, cancel) = watch::channel(false);
        Self {
            store,
            driver,
            concurrency: DEFAULT_CONCURRENCY,
            batch_size: DEFAULT_BATCH_SIZE,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            cancel,
        }
    }

    pub fn from_config(
        store: Arc<ManifestStore>,
        driver: Arc<dyn DocumentationDriver>,
        config: &DriverConfig,
    ) -> Self {
        Self::new(store, driver)
            .with_concurrency(config.concurrency)
            .with_batch_size(config.batch_size)
            .with_timeout(Duration::from_secs(config.timeout_secs))
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = cancel;
        self
    }

    fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Work through pending entries until none are left, `limit` entries were
    /// attempted, or the run is cancelled. Each entry is attempted at most
    /// once per call, so entries that time out do not loop forever.
    #[instrument(skip(self), fields(driver = self.driver.name()))]
    pub async fn run(&self, category: Option<&str>, limit: Option<usize>) -> Result<DispatchSummary> {
        let mut summary = DispatchSummary::default();
        let mut attempted: HashSet<IdentityKey> = HashSet::new();

        loop {
            if self.is_cancelled() {
                break;
            }
            let remaining = limit.map(|l| l.saturating_sub(summary.attempted));
            if remaining == Some(0) {
                break;
            }

            let want = remaining.map_or(self.batch_size, |r| r.min(self.batch_size));
            let batch: Vec<ManifestEntry> = self
                .store
                .next_pending_batch(category, want + attempted.len())?
                .into_iter()
                .filter(|e| !attempted.contains(&e.key()))
                .take(want)
                .collect();
            if batch.is_empty() {
                break;
            }

            attempted.extend(batch.iter().map(|e| e.key()));
            let batch_summary = self.dispatch(batch).await?;
            summary.merge(&batch_summary);
        }

        info!(
            "Driver '{}' finished: {} attempted, {} documented, {} errors, {} manual review, {} timed out, {} cancelled",
            self.driver.name(),
            summary.attempted,
            summary.documented,
            summary.errors,
            summary.manual_review,
            summary.timed_out,
            summary.cancelled
        );
        Ok(summary)
    }

    /// Dispatch one batch with bounded concurrency and record the outcomes
    pub async fn dispatch(&self, batch: Vec<ManifestEntry>) -> Result<DispatchSummary> {
        let mut summary = DispatchSummary::default();

        let mut stream = futures::stream::iter(batch)
            .map(|entry| {
                let driver = Arc::clone(&self.driver);
                let mut cancel = self.cancel.clone();
                let timeout = self.timeout;
                async move {
                    if *cancel.borrow() {
                        return (entry, Attempt::Cancelled);
                    }
                    let attempt = tokio::select! {
                        biased;
                        _ = wait_cancelled(&mut cancel) => Attempt::Cancelled,
                        result = tokio::time::timeout(timeout, driver.document(&entry)) => {
                            match result {
                                Err(_) => Attempt::TimedOut,
                                Ok(Ok(outcome)) => Attempt::Finished(outcome),
                                Ok(Err(e)) => Attempt::Finished(Outcome::Error(driver_reason(e))),
                            }
                        }
                    };
                    (entry, attempt)
                }
            })
            .buffer_unordered(self.concurrency);

        while let Some((entry, attempt)) = stream.next().await {
            let key = entry.key();
            summary.attempted += 1;
            match attempt {
                Attempt::TimedOut => {
                    summary.timed_out += 1;
                    warn!(
                        "{}, left pending",
                        LedgerError::timeout(format!("documenting {}", key), self.timeout)
                    );
                }
                Attempt::Cancelled => {
                    summary.cancelled += 1;
                    debug!("Cancelled before documenting {}", key);
                }
                Attempt::Finished(outcome) => self.record(&key, &outcome, &mut summary)?,
            }
        }

        Ok(summary)
    }

    fn record(&self, key: &IdentityKey, outcome: &Outcome, summary: &mut DispatchSummary) -> Result<()> {
        match self.store.report_result(key, outcome, Actor::Driver) {
            Ok(_) => {
                match outcome {
                    Outcome::Documented => summary.documented += 1,
                    Outcome::Error(reason) => {
                        summary.errors += 1;
                        warn!("Driver failed on {}: {}", key, reason);
                    }
                    Outcome::ManualReview(_) => summary.manual_review += 1,
                }
                Ok(())
            }
            // Reconciled or requeued while the driver worked on it
            Err(e @ (LedgerError::InvalidTransition { .. } | LedgerError::EntryNotFound(_))) => {
                summary.rejected += 1;
                warn!("Discarding driver outcome: {}", e);
                Ok(())
            }
            Err(e @ LedgerError::MissingReason { .. }) => {
                summary.rejected += 1;
                warn!("Discarding driver outcome without a reason: {}", e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

fn driver_reason(error: LedgerError) -> String {
    match error {
        LedgerError::Driver { reason, .. } => reason,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::Reconciler;
    use crate::storage::{Database, GapLog};
    use crate::types::{EntityCandidate, EntryStatus, Location, RunId};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Documents everything except a few magic names
    struct ScriptedDriver {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DocumentationDriver for ScriptedDriver {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn document(&self, entry: &ManifestEntry) -> Result<Outcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match entry.item_name.as_str() {
                "slow" => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(Outcome::Documented)
                }
                "broken" => Err(LedgerError::driver(entry.key(), "model refused")),
                "unsure" => Ok(Outcome::ManualReview("two overloads".to_string())),
                "mute" => Ok(Outcome::Error(String::new())),
                _ => Ok(Outcome::Documented),
            }
        }
    }

    fn driver() -> Arc<ScriptedDriver> {
        Arc::new(ScriptedDriver {
            calls: AtomicUsize::new(0),
        })
    }

    fn seeded(names: &[&str]) -> (Arc<ManifestStore>, Arc<Database>) {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let db = Arc::new(db);
        let store = Arc::new(ManifestStore::new(Arc::clone(&db)));
        let candidates: Vec<_> = names
            .iter()
            .enumerate()
            .map(|(i, n)| EntityCandidate::new("function", *n, Location::new("src/lib.rs", i as u32 + 1)))
            .collect();
        Reconciler::default()
            .reconcile(&store, "function", "/src", &candidates, RunId::new(1))
            .unwrap();
        (store, db)
    }

    #[tokio::test]
    async fn test_outcomes_written_back() {
        let (store, db) = seeded(&["a", "broken", "unsure", "b"]);
        let runner = DriverRunner::new(Arc::clone(&store), driver()).with_concurrency(2);

        let summary = runner.run(Some("function"), None).await.unwrap();
        assert_eq!(summary.attempted, 4);
        assert_eq!(summary.documented, 2);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.manual_review, 1);

        let manifest = store.load("function").unwrap();
        assert_eq!(manifest.count_status(EntryStatus::Documented), 2);
        let broken = manifest.entries.iter().find(|e| e.item_name == "broken").unwrap();
        assert_eq!(broken.status, EntryStatus::Error);
        assert_eq!(broken.reason.as_deref(), Some("model refused"));

        assert_eq!(GapLog::new(db).list(None).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reasonless_failure_is_rejected() {
        let (store, db) = seeded(&["mute", "a"]);
        let runner = DriverRunner::new(Arc::clone(&store), driver());

        let summary = runner.run(None, None).await.unwrap();
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.documented, 1);
        assert_eq!(summary.errors, 0);

        let pending = store.list_by_status("function", EntryStatus::Pending).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].item_name, "mute");
        assert!(GapLog::new(db).list(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_leaves_entry_pending() {
        let (store, _db) = seeded(&["slow", "quick"]);
        let scripted = driver();
        let runner = DriverRunner::new(Arc::clone(&store), scripted.clone())
            .with_timeout(Duration::from_millis(50));

        let summary = runner.run(None, None).await.unwrap();
        assert_eq!(summary.timed_out, 1);
        assert_eq!(summary.documented, 1);
        // Attempted once, not retried within the same run
        assert_eq!(scripted.calls.load(Ordering::SeqCst), 2);

        let pending = store.list_by_status("function", EntryStatus::Pending).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].item_name, "slow");
    }

    #[tokio::test]
    async fn test_cancellation_leaves_entries_pending() {
        let (store, _db) = seeded(&["slow", "slow2"]);
        let (handle, rx) = cancellation();
        let runner = DriverRunner::new(Arc::clone(&store), driver()).with_cancellation(rx);

        handle.cancel();
        let summary = runner.run(None, None).await.unwrap();
        assert_eq!(summary.documented, 0);
        assert_eq!(
            store.list_by_status("function", EntryStatus::Pending).unwrap().len(),
            2
        );
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_mid_flight() {
        let (store, _db) = seeded(&["slow"]);
        let (handle, rx) = cancellation();
        let runner = DriverRunner::new(Arc::clone(&store), driver()).with_cancellation(rx);

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            handle.cancel();
        });
        let summary = runner.run(None, None).await.unwrap();
        canceller.await.unwrap();

        assert_eq!(summary.cancelled, 1);
        assert_eq!(
            store.list_by_status("function", EntryStatus::Pending).unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_limit_caps_attempts() {
        let (store, _db) = seeded(&["a", "b", "c", "d", "e"]);
        let runner = DriverRunner::new(Arc::clone(&store), driver()).with_batch_size(2);

        let summary = runner.run(None, Some(3)).await.unwrap();
        assert_eq!(summary.attempted, 3);
        assert_eq!(
            store.list_by_status("function", EntryStatus::Pending).unwrap().len(),
            2
        );
    }
}
