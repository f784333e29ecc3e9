use crate::config::types::{
    Config, CopyUsersConfig, CrawlConfig, DeliveryConfig, ProviderConfig, TransferConfig,
    UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_transfer_config(&config.transfer)?;
    validate_crawl_config(&config.crawl)?;
    validate_provider_config(&config.provider)?;
    validate_delivery_config(&config.delivery)?;
    validate_copy_users_config(&config.copy_users)?;
    validate_user_agent_config(&config.user_agent)?;
    Ok(())
}

/// Validates a document store URL
///
/// Accepted forms are `sqlite::memory:`, `sqlite://<path>` and
/// `http(s)://host[:port]/<index>`.
pub fn validate_store_url(raw: &str) -> Result<(), ConfigError> {
    if raw == "sqlite::memory:" {
        return Ok(());
    }

    if let Some(path) = raw.strip_prefix("sqlite://") {
        if path.is_empty() {
            return Err(ConfigError::InvalidUrl(format!(
                "SQLite store URL '{}' has no path",
                raw
            )));
        }
        return Ok(());
    }

    validate_http_url(raw, "store URL")
}

fn validate_transfer_config(config: &TransferConfig) -> Result<(), ConfigError> {
    if config.page_size < 1 {
        return Err(ConfigError::Validation(format!(
            "page_size must be >= 1, got {}",
            config.page_size
        )));
    }

    if config.commit_every < 1 {
        return Err(ConfigError::Validation(format!(
            "commit_every must be >= 1, got {}",
            config.commit_every
        )));
    }

    Ok(())
}

fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.max_trials < 1 {
        return Err(ConfigError::Validation(format!(
            "max_trials must be >= 1, got {}",
            config.max_trials
        )));
    }

    if config.entity_limit < 1 {
        return Err(ConfigError::Validation(format!(
            "entity_limit must be >= 1, got {}",
            config.entity_limit
        )));
    }

    if config.delivery_batch_size < 1 {
        return Err(ConfigError::Validation(format!(
            "delivery_batch_size must be >= 1, got {}",
            config.delivery_batch_size
        )));
    }

    if config.entity_field.trim().is_empty() {
        return Err(ConfigError::Validation(
            "entity_field cannot be empty".to_string(),
        ));
    }

    if let Some(field) = &config.required_field {
        if field.trim().is_empty() {
            return Err(ConfigError::Validation(
                "required_field cannot be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_provider_config(config: &ProviderConfig) -> Result<(), ConfigError> {
    if let Some(base_url) = &config.base_url {
        validate_http_url(base_url, "provider base_url")?;
    }
    Ok(())
}

fn validate_delivery_config(config: &DeliveryConfig) -> Result<(), ConfigError> {
    if let Some(url) = &config.url {
        validate_http_url(url, "delivery url")?;
    }
    Ok(())
}

fn validate_copy_users_config(config: &CopyUsersConfig) -> Result<(), ConfigError> {
    if let Some(url) = &config.source_url {
        validate_store_url(url)?;
    }
    Ok(())
}

fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates an absolute http(s) URL with a host
fn validate_http_url(raw: &str, what: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", what, raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            what, raw
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' has no host",
            what, raw
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
