//! Paginated store-to-store transfer
//!
//! The job walks the source store page by page and pushes every record into
//! the destination. The page bound is computed once, from the total reported
//! by the first successful response, and is not re-read on later pages: a
//! source that grows or shrinks mid-run does not move the loop bound.

use crate::store::{DocumentStore, Query, Record};
use std::collections::HashSet;
use std::fmt;
use tokio::sync::watch;

/// Running totals of one transfer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferCounters {
    /// Records accepted by the destination
    pub records_copied: u64,
    /// Pages queried and pushed
    pub pages_processed: u64,
    /// Pages whose query failed and were skipped
    pub pages_failed: u64,
    /// Records the destination refused
    pub save_failures: u64,
    /// Periodic refreshes issued during the run
    pub commits: u64,
    /// Page bound computed from the first response
    pub planned_pages: u64,
}

impl fmt::Display for TransferCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records in {}/{} pages ({} pages failed, {} saves failed, {} commits)",
            self.records_copied,
            self.pages_processed,
            self.planned_pages,
            self.pages_failed,
            self.save_failures,
            self.commits
        )
    }
}

/// The unique records of one fetched page
#[derive(Debug, Clone)]
pub struct TransferPage {
    pub page: u32,
    pub page_size: u32,
    pub records: Vec<Record>,
}

impl TransferPage {
    /// Builds a page, keeping the first occurrence of every record id
    pub fn collect(page: u32, page_size: u32, fetched: Vec<Record>) -> Self {
        let mut seen = HashSet::new();
        let records = fetched
            .into_iter()
            .filter(|record| seen.insert(record.id.clone()))
            .collect();

        Self {
            page,
            page_size,
            records,
        }
    }
}

/// Copies every record matching a query from one store into another
pub struct PaginatedBulkTransferJob {
    commit_every: u64,
    progress: Option<watch::Sender<TransferCounters>>,
}

impl PaginatedBulkTransferJob {
    /// Creates a job that refreshes the destination every `commit_every` pushed records
    pub fn new(commit_every: u64) -> Self {
        Self {
            commit_every: commit_every.max(1),
            progress: None,
        }
    }

    /// Publishes a counter snapshot after every page
    pub fn with_progress(mut self, progress: watch::Sender<TransferCounters>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Runs the transfer
    ///
    /// Query failures skip the page; save failures skip the record. Neither
    /// aborts the run. The final refresh is left to the caller's exit guard.
    ///
    /// # Arguments
    ///
    /// * `source` - Store to read from
    /// * `destination` - Store to push into
    /// * `base_query` - Query selecting the records to copy
    /// * `page_size` - Records requested per page
    pub async fn run(
        &self,
        source: &dyn DocumentStore,
        destination: &dyn DocumentStore,
        base_query: &Query,
        page_size: u32,
    ) -> TransferCounters {
        let page_size = page_size.max(1);
        let mut counters = TransferCounters::default();
        let mut page_count: Option<u64> = None;
        let mut next_commit = self.commit_every;
        let mut page: u64 = 0;

        // Until the first response arrives only page 0 is planned
        while page < page_count.unwrap_or(1) {
            let response = match source.query(base_query, page as u32, page_size).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(page, "Error while querying {}: {}", source.describe(), e);
                    counters.pages_failed += 1;
                    self.publish(&counters);
                    page += 1;
                    continue;
                }
            };

            if page_count.is_none() {
                let pages = response.total_hits.div_ceil(u64::from(page_size));
                tracing::info!("Paging through query {:?}", base_query);
                tracing::info!(
                    "Set numFound to {} ({} pages of {})",
                    response.total_hits,
                    pages,
                    page_size
                );
                page_count = Some(pages);
                counters.planned_pages = pages;

                if page >= pages {
                    break;
                }
            }

            let transfer_page = TransferPage::collect(page as u32, page_size, response.records);
            self.push_page(destination, &transfer_page, &mut counters)
                .await;
            counters.pages_processed += 1;

            tracing::info!(
                "Page {} out of {} pageSize: {}",
                page,
                counters.planned_pages,
                page_size
            );

            if counters.records_copied >= next_commit {
                tracing::info!("Commit after {} records ...", counters.records_copied);
                match destination.refresh().await {
                    Ok(()) => counters.commits += 1,
                    Err(e) => tracing::warn!(
                        page,
                        "Periodic refresh of {} failed: {}",
                        destination.describe(),
                        e
                    ),
                }
                next_commit = (counters.records_copied / self.commit_every + 1) * self.commit_every;
            }

            self.publish(&counters);
            page += 1;
        }

        counters
    }

    async fn push_page(
        &self,
        destination: &dyn DocumentStore,
        transfer_page: &TransferPage,
        counters: &mut TransferCounters,
    ) {
        for record in &transfer_page.records {
            match destination.save(record, false).await {
                Ok(()) => counters.records_copied += 1,
                Err(e) => {
                    counters.save_failures += 1;
                    tracing::warn!(
                        page = transfer_page.page,
                        "Failed to push record {}: {}",
                        record.id,
                        e
                    );
                }
            }
        }
    }

    fn publish(&self, counters: &TransferCounters) {
        if let Some(progress) = &self.progress {
            progress.send_replace(*counters);
        }
    }
}
