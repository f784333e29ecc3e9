//! Configuration module for Doc-Ferry
//!
//! This module handles loading, parsing, and validating the optional TOML
//! configuration file. Every key has a default, so the tool also runs without one.
//!
//! # Example
//!
//! ```no_run
//! use doc_ferry::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("ferry.toml")).unwrap();
//! println!("Transfer page size: {}", config.transfer.page_size);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CopyUsersConfig, CrawlConfig, DeliveryConfig, ProviderConfig, TransferConfig,
    UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::{validate, validate_store_url};
