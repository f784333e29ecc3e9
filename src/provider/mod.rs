//! External content provider module
//!
//! The crawl scheduler only needs two things from a provider: the items of one
//! entity and the number of calls left before the provider starts refusing.

mod http;

pub use http::{build_http_client, HttpContentProvider};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors reported by a content provider
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Provider rate limit exceeded")]
    RateLimited,

    #[error("Invalid provider URL: {0}")]
    InvalidUrl(String),

    #[error("Provider failure: {0}")]
    Other(String),
}

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// A named source of content, ranked by how many items it is expected to have
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntity {
    pub id: String,
    pub expected_count: u64,
}

impl SourceEntity {
    pub fn new(id: impl Into<String>, expected_count: u64) -> Self {
        Self {
            id: id.into(),
            expected_count,
        }
    }
}

/// One content item fetched for an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    /// Identifier of the entity that produced the item
    #[serde(default)]
    pub entity: String,
    #[serde(default)]
    pub payload: Map<String, Value>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ContentItem {
    pub fn new(id: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entity: entity.into(),
            payload: Map::new(),
            created_at: None,
        }
    }
}

/// Trait for rate-limited content sources
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Fetches up to `max_count` items of one entity
    async fn fetch_items(&self, entity_id: &str, max_count: u64) -> ProviderResult<Vec<ContentItem>>;

    /// Number of calls the provider will still accept in its current window
    ///
    /// Refreshed by the provider on every call; callers should poll rather
    /// than cache it.
    async fn remaining_rate_limit(&self) -> ProviderResult<u32>;
}
