//! HTTP content provider implementation
//!
//! This module handles all requests to the external content API:
//! - Building HTTP clients with proper user agent strings
//! - Fetching the items of one entity
//! - Polling the remaining rate limit

use crate::config::UserAgentConfig;
use crate::provider::{ContentItem, ContentProvider, ProviderError, ProviderResult};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Builds an HTTP client with proper configuration
///
/// The same client is shared by REST stores, the provider and the remote
/// delivery channel.
///
/// # Example
///
/// ```no_run
/// use doc_ferry::config::UserAgentConfig;
/// use doc_ferry::provider::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    // Format: Name/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

#[derive(Debug, Deserialize)]
struct ItemsResponse {
    #[serde(default)]
    items: Vec<ContentItem>,
}

#[derive(Debug, Deserialize)]
struct RateLimitResponse {
    remaining: u32,
}

/// Content provider reached over HTTP
///
/// - `GET {base}/entities/{id}/items?count=N` returns `{"items": [...]}`
/// - `GET {base}/rate_limit` returns `{"remaining": n}`
pub struct HttpContentProvider {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpContentProvider {
    /// Creates a provider for the given base URL
    pub fn new(client: Client, base_url: &str, token: Option<String>) -> ProviderResult<Self> {
        let base_url =
            Url::parse(base_url).map_err(|e| ProviderError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> ProviderResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ProviderError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> ProviderResult<T> {
        let response = self.authorized(self.client.get(url)).send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl ContentProvider for HttpContentProvider {
    async fn fetch_items(&self, entity_id: &str, max_count: u64) -> ProviderResult<Vec<ContentItem>> {
        let mut url = self.endpoint(&["entities", entity_id, "items"])?;
        url.query_pairs_mut()
            .append_pair("count", &max_count.to_string());

        let response: ItemsResponse = self.get_json(url).await?;

        let items = response
            .items
            .into_iter()
            .take(max_count as usize)
            .map(|mut item| {
                if item.entity.is_empty() {
                    item.entity = entity_id.to_string();
                }
                item
            })
            .collect();

        Ok(items)
    }

    async fn remaining_rate_limit(&self) -> ProviderResult<u32> {
        let url = self.endpoint(&["rate_limit"])?;
        let response: RateLimitResponse = self.get_json(url).await?;
        Ok(response.remaining)
    }
}
