//! Migration pipelines
//!
//! This module contains the moving parts of every command:
//! - Paginated store-to-store transfer and its exit flush
//! - Rate-limited crawling with per-entity retries
//! - The command surface tying them to store URLs
//! - Shutdown signals feeding cancellation

mod exit_guard;
mod operations;
mod scheduler;
mod shutdown;
mod transfer;
mod worker;

pub use exit_guard::{run_guarded, ExitFlushGuard};
pub use operations::{Ferry, Operation, OperationSummary};
pub use scheduler::{CrawlOptions, CrawlReport, RateLimitedCrawlScheduler};
pub use shutdown::ShutdownSignal;
pub use transfer::{PaginatedBulkTransferJob, TransferCounters, TransferPage};
pub use worker::{AttemptOutcome, FetchAttempt, RetryingFetchWorker};
