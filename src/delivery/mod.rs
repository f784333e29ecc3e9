//! Delivery channels for crawled content
//!
//! Accepted items are either saved straight into a document store or forwarded
//! to a separate consuming process over HTTP.

mod local;
mod remote;

pub use local::LocalDelivery;
pub use remote::HttpDelivery;

use crate::provider::ContentItem;
use crate::store::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while handing a package to its consumer
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Consumer returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid delivery URL: {0}")]
    InvalidUrl(String),
}

/// Result type for delivery operations
pub type DeliveryResult<T> = Result<T, DeliveryError>;

/// A batch of accepted items for one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPackage {
    pub entity: String,
    pub items: Vec<ContentItem>,
}

impl ContentPackage {
    pub fn new(entity: impl Into<String>, items: Vec<ContentItem>) -> Self {
        Self {
            entity: entity.into(),
            items,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Trait for consumers of crawled content
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Hands a package over; an error fails the originating fetch attempt
    async fn send(&self, package: &ContentPackage) -> DeliveryResult<()>;

    /// Human-readable destination, used in log lines
    fn describe(&self) -> String;
}
