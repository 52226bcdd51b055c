use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;

use crate::domain::Entity;
use crate::error::Result;

/// An object listed from a bucket
#[derive(Clone, Debug, PartialEq)]
pub struct StoredObject {
    pub key: String,
    pub last_modified: DateTime<Utc>,
    pub size: u64,
}

#[async_trait]
pub trait ObjectStorePort: Send + Sync {
    /// Objects in `bucket` whose key starts with `prefix`, ordered by key
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<StoredObject>>;
    /// Copy an object to a local file, returning the number of bytes written
    async fn download(&self, bucket: &str, key: &str, destination: &Path) -> Result<u64>;
    async fn upload(&self, source: &Path, bucket: &str, key: &str) -> Result<()>;
}

/// Named-entity recognition over free text
#[async_trait]
pub trait EntityExtractorPort: Send + Sync {
    /// Labelled spans of `text`, in the order the model reports them
    async fn extract_entities(&self, text: &str) -> Result<Vec<Entity>>;
}

/// Fire-and-forget completion notices for downstream consumers
#[async_trait]
pub trait NotifierPort: Send + Sync {
    async fn publish(&self, topic: &str, message: &str) -> Result<()>;
}
