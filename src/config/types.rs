use serde::Deserialize;

/// Main configuration structure for Doc-Ferry
///
/// Every section is optional; a missing file or section falls back to the
/// defaults the migration tool has always used.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub transfer: TransferConfig,
    pub crawl: CrawlConfig,
    pub provider: ProviderConfig,
    pub delivery: DeliveryConfig,
    #[serde(rename = "copy-users")]
    pub copy_users: CopyUsersConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
}

/// Paginated store-to-store transfer configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Number of records requested per page
    #[serde(rename = "page-size")]
    pub page_size: u32,

    /// Force a destination refresh every time this many records have been pushed
    #[serde(rename = "commit-every")]
    pub commit_every: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            page_size: 300,
            commit_every: 100_000,
        }
    }
}

/// Rate-limited crawl configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Maximum sequential attempts per entity
    #[serde(rename = "max-trials")]
    pub max_trials: u32,

    /// Entities with fewer expected items than this end the crawl
    #[serde(rename = "min-count")]
    pub min_count: u64,

    /// Crawling pauses while the provider's remaining calls are at or below this
    #[serde(rename = "rate-limit-floor")]
    pub rate_limit_floor: u32,

    /// Seconds to sleep before polling the rate limit again
    #[serde(rename = "backoff-seconds")]
    pub backoff_seconds: u64,

    /// Maximum number of ranked entities pulled from the store facet
    #[serde(rename = "entity-limit")]
    pub entity_limit: u32,

    /// Document field holding the entity identifier
    #[serde(rename = "entity-field")]
    pub entity_field: String,

    /// Only documents carrying this field take part in the ranking
    #[serde(rename = "required-field")]
    pub required_field: Option<String>,

    /// Per-entity dedup capacity (0 = unbounded)
    #[serde(rename = "dedup-max-elements")]
    pub dedup_max_elements: usize,

    /// Per-entity dedup entry lifetime in seconds (0 = unbounded)
    #[serde(rename = "dedup-max-age-seconds")]
    pub dedup_max_age_seconds: u64,

    /// Number of items handed to the delivery channel at once
    #[serde(rename = "delivery-batch-size")]
    pub delivery_batch_size: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_trials: 3,
            min_count: 20,
            rate_limit_floor: 3,
            backoff_seconds: 30,
            entity_limit: 2000,
            entity_field: "user".to_string(),
            required_field: Some("update_dt".to_string()),
            dedup_max_elements: 0,
            dedup_max_age_seconds: 0,
            delivery_batch_size: 100,
        }
    }
}

/// External content provider configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL of the provider API
    #[serde(rename = "base-url")]
    pub base_url: Option<String>,

    /// Bearer token sent with every provider request
    pub token: Option<String>,
}

/// Remote delivery configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Endpoint receiving content packages; items are stored locally when unset
    pub url: Option<String>,
}

/// Configuration for the user copy command
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CopyUsersConfig {
    /// Store to read users from when no source URL is given on the command line
    #[serde(rename = "source-url")]
    pub source_url: Option<String>,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name of the tool
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the tool
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the operator
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for operator contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "DocFerry".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://localhost/".to_string(),
            contact_email: "ops@localhost.localdomain".to_string(),
        }
    }
}
