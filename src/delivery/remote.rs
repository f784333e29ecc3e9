use crate::delivery::{ContentPackage, DeliveryChannel, DeliveryError, DeliveryResult};
use async_trait::async_trait;
use reqwest::Client;
use url::Url;

/// Forwards packages to a consuming process with `POST {url}`
pub struct HttpDelivery {
    client: Client,
    url: Url,
}

impl HttpDelivery {
    pub fn new(client: Client, url: &str) -> DeliveryResult<Self> {
        let url = Url::parse(url).map_err(|e| DeliveryError::InvalidUrl(format!("{}: {}", url, e)))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl DeliveryChannel for HttpDelivery {
    async fn send(&self, package: &ContentPackage) -> DeliveryResult<()> {
        if package.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .post(self.url.clone())
            .json(package)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        tracing::trace!(
            "Delivered {} items of {} to {}",
            package.len(),
            package.entity,
            self.url
        );
        Ok(())
    }

    fn describe(&self) -> String {
        self.url.to_string()
    }
}
