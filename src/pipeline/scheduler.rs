//! Rate-limited crawl scheduler
//!
//! This module handles:
//! - Ranking entities by expected item count and cutting off the tail
//! - Pausing all dispatch while the provider's rate limit is exhausted
//! - Running each entity's attempts one at a time with a bounded retry budget
//! - Cooperative cancellation while waiting

use crate::config::CrawlConfig;
use crate::pipeline::worker::{AttemptOutcome, RetryingFetchWorker};
use crate::provider::{ContentProvider, SourceEntity};
use crate::state::{BoundedDedupSet, EntityState};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Crawl limits
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Maximum sequential attempts per entity
    pub max_trials_per_entity: u32,
    /// The crawl stops at the first entity expecting fewer items than this
    pub min_count_threshold: u64,
    /// Dispatch waits while the remaining rate limit is at or below this
    pub rate_limit_floor: u32,
    /// Sleep between rate limit polls
    pub backoff: Duration,
    /// Per-entity dedup element cap (0 = unbounded)
    pub dedup_max_elements: usize,
    /// Per-entity dedup age cap (zero = unbounded)
    pub dedup_max_age: Duration,
}

impl From<&CrawlConfig> for CrawlOptions {
    fn from(config: &CrawlConfig) -> Self {
        Self {
            max_trials_per_entity: config.max_trials,
            min_count_threshold: config.min_count,
            rate_limit_floor: config.rate_limit_floor,
            backoff: Duration::from_secs(config.backoff_seconds),
            dedup_max_elements: config.dedup_max_elements,
            dedup_max_age: Duration::from_secs(config.dedup_max_age_seconds),
        }
    }
}

/// What a crawl run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    /// Entities at or above the threshold that were started
    pub entities_visited: u64,
    pub entities_succeeded: u64,
    /// Entities whose every trial failed
    pub entities_exhausted: u64,
    pub items_delivered: u64,
    /// Sleeps taken because the rate limit was exhausted
    pub rate_limit_waits: u64,
    /// First entity below the count threshold, if the run stopped on one
    pub stopped_at: Option<String>,
    /// The run was cancelled while waiting
    pub interrupted: bool,
}

impl fmt::Display for CrawlReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entities visited ({} succeeded, {} exhausted), {} items delivered, {} rate limit waits",
            self.entities_visited,
            self.entities_succeeded,
            self.entities_exhausted,
            self.items_delivered,
            self.rate_limit_waits
        )?;
        if self.interrupted {
            write!(f, ", interrupted")?;
        }
        Ok(())
    }
}

/// Dispatches fetch attempts for ranked entities behind a shared rate limit
pub struct RateLimitedCrawlScheduler {
    provider: Arc<dyn ContentProvider>,
    worker: RetryingFetchWorker,
    options: CrawlOptions,
}

impl RateLimitedCrawlScheduler {
    /// Creates a new scheduler
    ///
    /// Every entity gets at least one trial.
    ///
    /// # Arguments
    ///
    /// * `provider` - Provider polled for its remaining rate limit
    /// * `worker` - Worker whose attempts are dispatched
    /// * `options` - Crawl limits
    pub fn new(
        provider: Arc<dyn ContentProvider>,
        worker: RetryingFetchWorker,
        mut options: CrawlOptions,
    ) -> Self {
        options.max_trials_per_entity = options.max_trials_per_entity.max(1);
        Self {
            provider,
            worker,
            options,
        }
    }

    /// Crawls entities in descending order of expected count
    ///
    /// Returns when the list is exhausted, when an entity falls below the
    /// count threshold, or when `cancel` fires during a wait. Per-entity
    /// failures never end the run.
    pub async fn run(&self, entities: Vec<SourceEntity>, cancel: &CancellationToken) -> CrawlReport {
        let mut ranked = entities;
        ranked.sort_by(|a, b| b.expected_count.cmp(&a.expected_count));

        tracing::info!("Found {} entities to crawl", ranked.len());

        let mut report = CrawlReport::default();

        for (position, entity) in ranked.into_iter().enumerate() {
            if entity.expected_count < self.options.min_count_threshold {
                tracing::info!(
                    "Stopping at {} with {} expected items (threshold {})",
                    entity.id,
                    entity.expected_count,
                    self.options.min_count_threshold
                );
                report.stopped_at = Some(entity.id);
                break;
            }

            tracing::info!(
                "{}> feed pipe from {} with {} items",
                position,
                entity.id,
                entity.expected_count
            );
            report.entities_visited += 1;

            let state = self.crawl_entity(&entity, cancel, &mut report).await;
            if state.is_success() {
                tracing::debug!(entity = %entity.id, "Entity completed: {}", state);
                report.entities_succeeded += 1;
                continue;
            }

            match state {
                EntityState::Exhausted { trials } => {
                    tracing::warn!(
                        entity = %entity.id,
                        "Giving up on {} after {} failed trials",
                        entity.id,
                        trials
                    );
                    report.entities_exhausted += 1;
                }
                EntityState::Interrupted { trial } => {
                    tracing::warn!(
                        entity = %entity.id,
                        trial,
                        "Interrupted while crawling {}, stopping",
                        entity.id
                    );
                    report.interrupted = true;
                    break;
                }
                other => {
                    tracing::error!(entity = %entity.id, "Entity left in state {}", other);
                }
            }
        }

        tracing::info!("Crawl finished: {}", report);
        report
    }

    /// Drives one entity through its retry states until a terminal one
    async fn crawl_entity(
        &self,
        entity: &SourceEntity,
        cancel: &CancellationToken,
        report: &mut CrawlReport,
    ) -> EntityState {
        // Shared by every trial of this entity, and only this entity
        let dedup = Arc::new(Mutex::new(BoundedDedupSet::new(
            self.options.dedup_max_elements,
            self.options.dedup_max_age,
        )));

        let mut state = EntityState::Pending;
        while !state.is_terminal() {
            state = match state.advance(self.options.max_trials_per_entity) {
                EntityState::Running { trial } => {
                    self.run_trial(entity, trial, &dedup, cancel, report).await
                }
                next => next,
            };
        }
        state
    }

    async fn run_trial(
        &self,
        entity: &SourceEntity,
        trial: u32,
        dedup: &Arc<Mutex<BoundedDedupSet>>,
        cancel: &CancellationToken,
        report: &mut CrawlReport,
    ) -> EntityState {
        if !self.wait_for_rate_limit(cancel, report).await {
            return EntityState::Interrupted { trial };
        }

        let handle = self.worker.spawn(entity.clone(), trial, dedup.clone());

        tokio::select! {
            biased;

            joined = handle => match joined {
                Ok(attempt) => {
                    // Batches accepted before a failure are delivered too
                    report.items_delivered += attempt.delivered() as u64;
                    match attempt.outcome {
                        AttemptOutcome::Success { fetched, delivered } => {
                            tracing::debug!(
                                entity = %entity.id,
                                trial,
                                "Fetched {} items, delivered {}",
                                fetched,
                                delivered
                            );
                            EntityState::Succeeded { trial }
                        }
                        AttemptOutcome::Failure { cause, delivered } => {
                            tracing::warn!(
                                entity = %entity.id,
                                trial,
                                delivered,
                                "{}> Try again feeding of {}: {}",
                                trial,
                                entity.id,
                                cause
                            );
                            EntityState::Failed { trial, cause }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(entity = %entity.id, trial, "Attempt task failed: {}", e);
                    EntityState::Failed {
                        trial,
                        cause: e.to_string(),
                    }
                }
            },
            // The attempt keeps running detached; it is not aborted
            _ = cancel.cancelled() => EntityState::Interrupted { trial },
        }
    }

    /// Blocks until the provider reports more calls than the floor
    ///
    /// A failed poll counts as exhausted. Returns false if cancelled.
    async fn wait_for_rate_limit(&self, cancel: &CancellationToken, report: &mut CrawlReport) -> bool {
        loop {
            if cancel.is_cancelled() {
                return false;
            }

            match self.provider.remaining_rate_limit().await {
                Ok(remaining) if remaining > self.options.rate_limit_floor => return true,
                Ok(remaining) => tracing::info!(
                    "Rate limit at {} (floor {}), sleeping {} seconds",
                    remaining,
                    self.options.rate_limit_floor,
                    self.options.backoff.as_secs()
                ),
                Err(e) => tracing::warn!(
                    "Could not read rate limit ({}), sleeping {} seconds",
                    e,
                    self.options.backoff.as_secs()
                ),
            }

            report.rate_limit_waits += 1;
            tokio::select! {
                _ = tokio::time::sleep(self.options.backoff) => {}
                _ = cancel.cancelled() => return false,
            }
        }
    }
}
