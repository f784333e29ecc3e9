//! Fetch-and-deliver attempt for one entity
//!
//! Each attempt runs in its own spawned task. The only state it shares with
//! the scheduler is the entity's dedup set, passed in, and the outcome,
//! returned through the task's join handle.

use crate::delivery::{ContentPackage, DeliveryChannel};
use crate::provider::{ContentItem, ContentProvider, SourceEntity};
use crate::state::BoundedDedupSet;
use crate::FerryError;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;

/// Result of one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Every accepted item was delivered
    Success { fetched: usize, delivered: usize },
    /// The provider or the delivery channel failed after `delivered` items went out
    Failure { cause: String, delivered: usize },
}

/// One (entity, trial) execution and its outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchAttempt {
    pub entity: String,
    pub trial: u32,
    pub outcome: AttemptOutcome,
}

impl FetchAttempt {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Success { .. })
    }

    /// Items the channel accepted during this attempt, whatever its outcome
    pub fn delivered(&self) -> usize {
        match self.outcome {
            AttemptOutcome::Success { delivered, .. } | AttemptOutcome::Failure { delivered, .. } => {
                delivered
            }
        }
    }
}

/// Fetches an entity's items and hands the new ones to a delivery channel
#[derive(Clone)]
pub struct RetryingFetchWorker {
    provider: Arc<dyn ContentProvider>,
    delivery: Arc<dyn DeliveryChannel>,
    batch_size: usize,
}

impl RetryingFetchWorker {
    /// Creates a worker
    ///
    /// # Arguments
    ///
    /// * `provider` - Source of content items
    /// * `delivery` - Consumer of accepted items
    /// * `batch_size` - Items per delivered package
    pub fn new(
        provider: Arc<dyn ContentProvider>,
        delivery: Arc<dyn DeliveryChannel>,
        batch_size: usize,
    ) -> Self {
        Self {
            provider,
            delivery,
            batch_size: batch_size.max(1),
        }
    }

    /// Runs one attempt in its own task
    pub fn spawn(
        &self,
        entity: SourceEntity,
        trial: u32,
        dedup: Arc<Mutex<BoundedDedupSet>>,
    ) -> JoinHandle<FetchAttempt> {
        let worker = self.clone();
        tokio::spawn(async move { worker.attempt(&entity, trial, &dedup).await })
    }

    /// Runs one attempt to completion
    ///
    /// Items already in `dedup` are skipped. Ids of each delivered batch are
    /// recorded in `dedup` as soon as the channel accepts it, so a later
    /// failing batch still leaves the earlier ones marked for the next trial.
    pub async fn attempt(
        &self,
        entity: &SourceEntity,
        trial: u32,
        dedup: &Mutex<BoundedDedupSet>,
    ) -> FetchAttempt {
        let mut delivered = 0;
        let outcome = match self.fetch_and_deliver(entity, dedup, &mut delivered).await {
            Ok(fetched) => AttemptOutcome::Success { fetched, delivered },
            Err(e) => AttemptOutcome::Failure {
                cause: e.to_string(),
                delivered,
            },
        };

        FetchAttempt {
            entity: entity.id.clone(),
            trial,
            outcome,
        }
    }

    /// Returns the number of fetched items; `delivered` counts accepted ones
    async fn fetch_and_deliver(
        &self,
        entity: &SourceEntity,
        dedup: &Mutex<BoundedDedupSet>,
        delivered: &mut usize,
    ) -> Result<usize, FerryError> {
        let items = self
            .provider
            .fetch_items(&entity.id, entity.expected_count)
            .await?;
        let fetched = items.len();

        let accepted: Vec<ContentItem> = {
            let seen = lock(dedup);
            let mut batch_ids = HashSet::new();
            items
                .into_iter()
                .filter(|item| !seen.contains(&item.id) && batch_ids.insert(item.id.clone()))
                .collect()
        };

        tracing::debug!(
            entity = %entity.id,
            "{} of {} fetched items are new",
            accepted.len(),
            fetched
        );

        for batch in accepted.chunks(self.batch_size) {
            let package = ContentPackage::new(entity.id.clone(), batch.to_vec());
            self.delivery.send(&package).await?;

            {
                let mut seen = lock(dedup);
                for item in batch {
                    seen.add(item.id.clone());
                }
            }
            *delivered += batch.len();
        }

        Ok(fetched)
    }
}

/// A panicked attempt must not take the entity's dedup state down with it
fn lock(dedup: &Mutex<BoundedDedupSet>) -> MutexGuard<'_, BoundedDedupSet> {
    dedup.lock().unwrap_or_else(PoisonError::into_inner)
}
