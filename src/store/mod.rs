//! Document store module
//!
//! This module holds the store abstraction used by every migration command:
//! - The `DocumentStore` trait and its error type
//! - A SQLite-backed store with staged writes and explicit refresh
//! - An Elasticsearch-compatible REST store
//! - URL-based selection of the backend

mod elastic;
mod schema;
mod sqlite;
mod traits;

pub use elastic::ElasticStore;
pub use sqlite::SqliteStore;
pub use traits::{DocumentStore, StoreError, StoreResult};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

/// A document held by a store
///
/// Identity is the `id`; two records with the same id are the same document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub body: Map<String, Value>,
}

impl Record {
    /// Creates a record with an empty body
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: Map::new(),
        }
    }

    /// Creates a record from a JSON value, keeping only object bodies
    pub fn from_value(id: impl Into<String>, body: Value) -> Option<Self> {
        match body {
            Value::Object(body) => Some(Self {
                id: id.into(),
                body,
            }),
            _ => None,
        }
    }

    /// Sets a field, returning the record
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.body.insert(name.into(), value.into());
        self
    }

    /// Gets a field value
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.body.get(name)
    }
}

/// A single filter clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// The field is present and not null
    Exists(String),
    /// The field equals the given value
    Term { field: String, value: String },
}

/// A store query; no filters means match-all
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub filters: Vec<Filter>,
}

impl Query {
    /// A query matching every document
    pub fn match_all() -> Self {
        Self::default()
    }

    /// Restricts the query to documents carrying `field`
    pub fn exists(mut self, field: impl Into<String>) -> Self {
        self.filters.push(Filter::Exists(field.into()));
        self
    }

    /// Restricts the query to documents where `field` equals `value`
    pub fn term(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(Filter::Term {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn is_match_all(&self) -> bool {
        self.filters.is_empty()
    }
}

/// One page of query results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPage {
    pub records: Vec<Record>,
    /// Total hits for the query at the time of the call, across all pages
    pub total_hits: u64,
}

/// Opens a document store from its URL
///
/// # Arguments
///
/// * `url` - `sqlite::memory:`, `sqlite://<path>` or `http(s)://host[:port]/<index>`
/// * `client` - HTTP client used by REST-backed stores
///
/// # Returns
///
/// * `Ok(Arc<dyn DocumentStore>)` - A connected store
/// * `Err(StoreError)` - The URL is unsupported or the store is unreachable
pub async fn open_store(url: &str, client: &Client) -> StoreResult<Arc<dyn DocumentStore>> {
    if url == "sqlite::memory:" {
        return Ok(Arc::new(SqliteStore::open_in_memory()?));
    }

    if let Some(path) = url.strip_prefix("sqlite://") {
        return Ok(Arc::new(SqliteStore::open(Path::new(path))?));
    }

    if url.starts_with("http://") || url.starts_with("https://") {
        let store = ElasticStore::connect(client.clone(), url).await?;
        return Ok(Arc::new(store));
    }

    Err(StoreError::UnsupportedUrl(url.to_string()))
}
