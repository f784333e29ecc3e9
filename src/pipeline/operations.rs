//! Top-level migration commands
//!
//! Each command opens the stores it needs from their URLs and composes the
//! transfer job, the crawl scheduler and the exit guard.

use crate::config::Config;
use crate::delivery::{DeliveryChannel, HttpDelivery, LocalDelivery};
use crate::pipeline::exit_guard::{run_guarded, ExitFlushGuard};
use crate::pipeline::scheduler::{CrawlOptions, CrawlReport, RateLimitedCrawlScheduler};
use crate::pipeline::transfer::{PaginatedBulkTransferJob, TransferCounters};
use crate::pipeline::worker::RetryingFetchWorker;
use crate::provider::{build_http_client, ContentProvider, HttpContentProvider, SourceEntity};
use crate::store::{open_store, DocumentStore, Query, Record};
use crate::{FerryError, Result};
use reqwest::Client;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Command selected with `--cmd`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    DeleteAll,
    FillFrom,
    CopyStaticTweets,
    CopyUsers,
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "deleteAll" | "delete-all" => Ok(Self::DeleteAll),
            "fillFrom" | "fill-from" => Ok(Self::FillFrom),
            "copyStaticTweets" | "copy-static-tweets" => Ok(Self::CopyStaticTweets),
            "copyUsers" | "copy-users" => Ok(Self::CopyUsers),
            other => Err(format!(
                "unknown command '{}' (expected deleteAll, fillFrom, copyStaticTweets or copyUsers)",
                other
            )),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DeleteAll => "deleteAll",
            Self::FillFrom => "fillFrom",
            Self::CopyStaticTweets => "copyStaticTweets",
            Self::CopyUsers => "copyUsers",
        };
        f.write_str(name)
    }
}

/// What a command did
#[derive(Debug, Clone, PartialEq)]
pub enum OperationSummary {
    Deleted {
        store: String,
    },
    Transferred {
        counters: TransferCounters,
        /// Ctrl+C arrived before the last page
        interrupted: bool,
    },
    Crawled(CrawlReport),
    UsersCopied {
        copied: usize,
        interrupted: bool,
    },
}

impl fmt::Display for OperationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deleted { store } => write!(f, "deleted all documents in {}", store),
            Self::Transferred {
                counters,
                interrupted,
            } => {
                write!(f, "transferred {}", counters)?;
                if *interrupted {
                    write!(f, " (interrupted)")?;
                }
                Ok(())
            }
            Self::Crawled(report) => write!(f, "crawled {}", report),
            Self::UsersCopied {
                copied,
                interrupted,
            } => {
                write!(f, "copied {} users", copied)?;
                if *interrupted {
                    write!(f, " (interrupted)")?;
                }
                Ok(())
            }
        }
    }
}

/// Runs migration commands against stores named by URL
pub struct Ferry {
    config: Config,
    client: Client,
}

impl Ferry {
    /// Creates a runner sharing one HTTP client across every store and endpoint
    pub fn new(config: Config) -> Result<Self> {
        let client = build_http_client(&config.user_agent)?;
        Ok(Self { config, client })
    }

    /// Runs one command
    ///
    /// # Arguments
    ///
    /// * `operation` - The command to run
    /// * `target_url` - Store the command writes to
    /// * `source_url` - Store the command reads from, for commands that have one
    /// * `cancel` - Fires on Ctrl+C
    pub async fn run(
        &self,
        operation: Operation,
        target_url: &str,
        source_url: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<OperationSummary> {
        tracing::info!("Running {} against {}", operation, target_url);

        match operation {
            Operation::DeleteAll => self.delete_all(target_url).await,
            Operation::FillFrom => self.fill_from(target_url, source_url, &cancel).await,
            Operation::CopyStaticTweets => self.copy_static_tweets(target_url, &cancel).await,
            Operation::CopyUsers => self.copy_users(target_url, source_url, &cancel).await,
        }
    }

    async fn open(&self, url: &str) -> Result<Arc<dyn DocumentStore>> {
        let store = open_store(url, &self.client).await?;
        tracing::debug!("Opened store {}", store.describe());
        Ok(store)
    }

    /// Removes every document from the target store
    pub async fn delete_all(&self, target_url: &str) -> Result<OperationSummary> {
        let target = self.open(target_url).await?;

        target.delete_all().await?;
        target.refresh().await?;

        tracing::info!("Deleted all documents in {}", target.describe());
        Ok(OperationSummary::Deleted {
            store: target.describe(),
        })
    }

    /// Copies every record of the source store into the target
    ///
    /// The destination is refreshed exactly once at the end, whether the
    /// transfer finished or `cancel` fired first.
    pub async fn fill_from(
        &self,
        target_url: &str,
        source_url: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<OperationSummary> {
        let source_url = source_url.ok_or_else(|| {
            FerryError::MissingArgument("fillFrom needs a source store (--url-from)".to_string())
        })?;

        let source = self.open(source_url).await?;
        let destination = self.open(target_url).await?;

        let (guard, progress) = ExitFlushGuard::new(destination.clone(), source.describe());
        let job = PaginatedBulkTransferJob::new(self.config.transfer.commit_every).with_progress(progress);

        let base_query = Query::match_all();
        let transfer = job.run(
            source.as_ref(),
            destination.as_ref(),
            &base_query,
            self.config.transfer.page_size,
        );

        let summary = match run_guarded(&guard, transfer, cancel.cancelled()).await {
            Some(counters) => OperationSummary::Transferred {
                counters,
                interrupted: false,
            },
            None => OperationSummary::Transferred {
                counters: guard.last_reported().unwrap_or_default(),
                interrupted: true,
            },
        };
        Ok(summary)
    }

    /// Crawls the provider for the target store's most active entities
    ///
    /// Entities are ranked by a terms facet over the target store. New items
    /// go to the configured delivery endpoint, or into the target store itself
    /// when none is configured.
    pub async fn copy_static_tweets(
        &self,
        target_url: &str,
        cancel: &CancellationToken,
    ) -> Result<OperationSummary> {
        let crawl = &self.config.crawl;
        let base_url = self.config.provider.base_url.as_deref().ok_or_else(|| {
            FerryError::MissingArgument("copyStaticTweets needs [provider] base-url".to_string())
        })?;

        let target = self.open(target_url).await?;

        let mut ranking = Query::match_all();
        if let Some(required) = &crawl.required_field {
            ranking = ranking.exists(required.clone());
        }
        let entities: Vec<SourceEntity> = target
            .facet_counts(&ranking, &crawl.entity_field, crawl.entity_limit)
            .await?
            .into_iter()
            .map(|(id, count)| SourceEntity::new(id, count))
            .collect();

        let provider: Arc<dyn ContentProvider> = Arc::new(HttpContentProvider::new(
            self.client.clone(),
            base_url,
            self.config.provider.token.clone(),
        )?);

        let delivery: Arc<dyn DeliveryChannel> = match &self.config.delivery.url {
            Some(url) => Arc::new(HttpDelivery::new(self.client.clone(), url)?),
            None => Arc::new(LocalDelivery::new(target.clone(), crawl.entity_field.clone())),
        };
        tracing::info!("Delivering crawled items to {}", delivery.describe());

        let worker = RetryingFetchWorker::new(provider.clone(), delivery, crawl.delivery_batch_size);
        let scheduler = RateLimitedCrawlScheduler::new(provider, worker, CrawlOptions::from(crawl));

        let report = scheduler.run(entities, cancel).await;

        if self.config.delivery.url.is_none() {
            target.refresh().await?;
        }

        Ok(OperationSummary::Crawled(report))
    }

    /// Copies every user record of the source store into the target in one bulk update
    pub async fn copy_users(
        &self,
        target_url: &str,
        source_url: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<OperationSummary> {
        let source_url = source_url
            .or(self.config.copy_users.source_url.as_deref())
            .ok_or_else(|| {
                FerryError::MissingArgument(
                    "copyUsers needs a source store (--url-from or [copy-users] source-url)"
                        .to_string(),
                )
            })?;

        let source = self.open(source_url).await?;
        let target = self.open(target_url).await?;

        let page_size = self.config.transfer.page_size.max(1);
        let query = Query::match_all();

        // Without a first page there is no total to page through
        let first = match source.query(&query, 0, page_size).await {
            Ok(first) => first,
            Err(e) => {
                tracing::warn!(page = 0, "Error while querying {}: {}", source.describe(), e);
                return Ok(OperationSummary::UsersCopied {
                    copied: 0,
                    interrupted: false,
                });
            }
        };
        let pages = first.total_hits.div_ceil(u64::from(page_size));
        tracing::info!("Reading {} users from {}", first.total_hits, source.describe());

        let mut seen = HashSet::new();
        let mut users: Vec<Record> = Vec::new();
        collect_unique(first.records, &mut seen, &mut users);

        for page in 1..pages {
            if cancel.is_cancelled() {
                tracing::warn!("Interrupted after {} of {} pages, nothing written", page, pages);
                return Ok(OperationSummary::UsersCopied {
                    copied: 0,
                    interrupted: true,
                });
            }
            match source.query(&query, page as u32, page_size).await {
                Ok(response) => collect_unique(response.records, &mut seen, &mut users),
                Err(e) => {
                    tracing::warn!(page, "Error while querying {}: {}", source.describe(), e)
                }
            }
        }

        target.update(&users).await?;
        target.refresh().await?;

        tracing::info!(
            "{} users pushed to {} from {}",
            users.len(),
            target.describe(),
            source.describe()
        );
        Ok(OperationSummary::UsersCopied {
            copied: users.len(),
            interrupted: false,
        })
    }
}

fn collect_unique(records: Vec<Record>, seen: &mut HashSet<String>, into: &mut Vec<Record>) {
    for record in records {
        if seen.insert(record.id.clone()) {
            into.push(record);
        }
    }
}
