//! Document store trait and error types
//!
//! This module defines the contract the migration pipeline needs from a
//! searchable document store, independent of the backend behind it.

use crate::store::{Query, QueryPage, Record};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Malformed store response: {0}")]
    MalformedResponse(String),

    #[error("Bulk request rejected {failed} of {total} documents")]
    BulkRejected { failed: usize, total: usize },

    #[error("Cannot connect to store {url}: {reason}")]
    Connection { url: String, reason: String },

    #[error("Unsupported store URL: {0}")]
    UnsupportedUrl(String),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Trait for searchable document store backends
///
/// Source and destination of a transfer may be different implementations.
/// All implementations must be `Send + Sync` so they can be shared with
/// spawned fetch tasks.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Human-readable location of this store, used in log lines
    fn describe(&self) -> String;

    /// Runs a paged query
    ///
    /// # Arguments
    ///
    /// * `query` - Filter to apply
    /// * `page` - Zero-based page number
    /// * `page_size` - Number of records per page
    ///
    /// # Returns
    ///
    /// The records of the requested page and the total number of hits for
    /// the query as seen at the time of the call
    async fn query(&self, query: &Query, page: u32, page_size: u32) -> StoreResult<QueryPage>;

    /// Saves a single record
    ///
    /// With `reconsolidate` unset the record may stay invisible to queries
    /// until the next `refresh`.
    async fn save(&self, record: &Record, reconsolidate: bool) -> StoreResult<()>;

    /// Saves a batch of records and makes them visible
    async fn update(&self, records: &[Record]) -> StoreResult<()>;

    /// Commits pending writes so that queries observe them
    ///
    /// Idempotent: a second call without intervening writes changes nothing.
    async fn refresh(&self) -> StoreResult<()>;

    /// Removes every document from the store
    async fn delete_all(&self) -> StoreResult<()>;

    /// Counts documents per distinct value of `field`, most frequent first
    ///
    /// # Arguments
    ///
    /// * `query` - Filter restricting which documents are counted
    /// * `field` - Field whose values are grouped
    /// * `limit` - Maximum number of terms returned
    async fn facet_counts(
        &self,
        query: &Query,
        field: &str,
        limit: u32,
    ) -> StoreResult<Vec<(String, u64)>>;
}
