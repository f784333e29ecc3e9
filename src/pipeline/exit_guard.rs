//! Final flush of a transfer destination
//!
//! The guard refreshes the destination once and logs what was transferred,
//! whether the job ran to completion or the process was asked to stop.

use crate::pipeline::transfer::TransferCounters;
use crate::store::DocumentStore;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::watch;

/// Finalizer that runs at most once per transfer
pub struct ExitFlushGuard {
    destination: Arc<dyn DocumentStore>,
    source: String,
    progress: watch::Receiver<TransferCounters>,
    fired: AtomicBool,
    reported: OnceLock<TransferCounters>,
}

impl ExitFlushGuard {
    /// Creates a guard for `destination`
    ///
    /// # Returns
    ///
    /// The guard and the sender the transfer job publishes progress into, so
    /// an interrupted run can still report partial totals.
    pub fn new(
        destination: Arc<dyn DocumentStore>,
        source: impl Into<String>,
    ) -> (Self, watch::Sender<TransferCounters>) {
        let (tx, rx) = watch::channel(TransferCounters::default());
        let guard = Self {
            destination,
            source: source.into(),
            progress: rx,
            fired: AtomicBool::new(false),
            reported: OnceLock::new(),
        };
        (guard, tx)
    }

    /// Refreshes the destination and logs the transfer summary
    ///
    /// `result` is the job's final counters; without it the last published
    /// snapshot is reported. Only the first call does anything.
    ///
    /// # Returns
    ///
    /// * `Some(counters)` - The counters that were reported
    /// * `None` - The guard had already fired
    pub async fn flush(&self, result: Option<TransferCounters>) -> Option<TransferCounters> {
        if self.fired.swap(true, Ordering::SeqCst) {
            return None;
        }

        let counters = result.unwrap_or_else(|| *self.progress.borrow());

        if let Err(e) = self.destination.refresh().await {
            tracing::error!("Final refresh of {} failed: {}", self.destination.describe(), e);
        }

        tracing::info!(
            "{} records pushed to {} from {}",
            counters.records_copied,
            self.destination.describe(),
            self.source
        );
        tracing::info!("Transfer summary: {}", counters);

        let _ = self.reported.set(counters);
        Some(counters)
    }

    /// Returns true once the guard has fired
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// The counters logged by the flush, once it has completed
    pub fn last_reported(&self) -> Option<TransferCounters> {
        self.reported.get().copied()
    }
}

/// Runs `job` under `guard`, flushing when the job ends or `shutdown` resolves
///
/// # Returns
///
/// * `Some(counters)` - The job ran to completion
/// * `None` - The shutdown signal arrived first; the partial totals were flushed
pub async fn run_guarded<J, S>(guard: &ExitFlushGuard, job: J, shutdown: S) -> Option<TransferCounters>
where
    J: Future<Output = TransferCounters>,
    S: Future<Output = ()>,
{
    tokio::select! {
        counters = job => {
            guard.flush(Some(counters)).await;
            Some(counters)
        }
        _ = shutdown => {
            tracing::warn!("Shutdown requested, flushing {} before exit", guard.destination.describe());
            guard.flush(None).await;
            None
        }
    }
}
