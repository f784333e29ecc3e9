use crate::delivery::{ContentPackage, DeliveryChannel, DeliveryResult};
use crate::provider::ContentItem;
use crate::store::{DocumentStore, Record};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Saves delivered items into a document store
///
/// Items are staged without reconsolidation; the owner of the store issues
/// the refresh once the crawl is over.
pub struct LocalDelivery {
    store: Arc<dyn DocumentStore>,
    entity_field: String,
}

impl LocalDelivery {
    /// Creates a channel writing into `store`
    ///
    /// # Arguments
    ///
    /// * `store` - Destination store
    /// * `entity_field` - Field that receives the owning entity's identifier
    pub fn new(store: Arc<dyn DocumentStore>, entity_field: impl Into<String>) -> Self {
        Self {
            store,
            entity_field: entity_field.into(),
        }
    }

    fn to_record(&self, item: &ContentItem) -> Record {
        let mut record = Record {
            id: item.id.clone(),
            body: item.payload.clone(),
        };
        record
            .body
            .insert(self.entity_field.clone(), Value::String(item.entity.clone()));
        if let Some(created_at) = item.created_at {
            record
                .body
                .insert("created_at".to_string(), Value::String(created_at.to_rfc3339()));
        }
        record
    }
}

#[async_trait]
impl DeliveryChannel for LocalDelivery {
    async fn send(&self, package: &ContentPackage) -> DeliveryResult<()> {
        for item in &package.items {
            self.store.save(&self.to_record(item), false).await?;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.store.describe()
    }
}
