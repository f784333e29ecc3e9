//! Doc-Ferry: bulk document migration and rate-limited content feeding
//!
//! This crate moves documents between two searchable document stores page by
//! page, and separately pulls content for a ranked list of source entities from
//! a rate-limited provider, delivering it into a destination store.

pub mod config;
pub mod delivery;
pub mod pipeline;
pub mod provider;
pub mod state;
pub mod store;

use thiserror::Error;

/// Main error type for Doc-Ferry operations
#[derive(Debug, Error)]
pub enum FerryError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("Provider error: {0}")]
    Provider(#[from] provider::ProviderError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] delivery::DeliveryError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing argument: {0}")]
    MissingArgument(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Doc-Ferry operations
pub type Result<T> = std::result::Result<T, FerryError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use pipeline::{
    CrawlReport, ExitFlushGuard, Operation, PaginatedBulkTransferJob, RateLimitedCrawlScheduler,
    RetryingFetchWorker, TransferCounters,
};
pub use state::{BoundedDedupSet, EntityState};
pub use store::{open_store, DocumentStore, Query, QueryPage, Record};
