use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::app::ports::{NotifierPort, ObjectStorePort};
use crate::domain::EnrichedRow;
use crate::infra::csv_output::write_rows_to_path;
use crate::observability::metrics::{emit_counter, MetricName};

pub const PUBLISHED_MESSAGE: &str = "New article data processed";

/// Where the output table goes and who hears about it
#[derive(Debug, Clone)]
pub struct PublishTarget {
    pub local_path: PathBuf,
    pub bucket: String,
    pub key: String,
    pub topic: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishOutcome {
    pub rows_written: usize,
    pub bucket: String,
    pub key: String,
}

/// Writes the enriched table, uploads it, then announces it
pub struct PublishUseCase {
    store: Arc<dyn ObjectStorePort>,
    notifier: Arc<dyn NotifierPort>,
}

impl PublishUseCase {
    pub fn new(store: Arc<dyn ObjectStorePort>, notifier: Arc<dyn NotifierPort>) -> Self {
        Self { store, notifier }
    }

    pub async fn publish(&self, rows: &[EnrichedRow], target: &PublishTarget) -> Result<PublishOutcome> {
        let rows_written = write_rows_to_path(&target.local_path, rows)
            .with_context(|| format!("Failed to write {}", target.local_path.display()))?;
        emit_counter(MetricName::RowsWritten, rows_written as u64);

        self.upload(&target.local_path, &target.bucket, &target.key).await?;

        // Only announce once the table is in place
        self.notifier
            .publish(&target.topic, PUBLISHED_MESSAGE)
            .await
            .with_context(|| format!("Failed to notify topic {}", target.topic))?;
        emit_counter(MetricName::NotificationsPublished, 1);
        info!("Published {} rows to {}/{}", rows_written, target.bucket, target.key);

        Ok(PublishOutcome {
            rows_written,
            bucket: target.bucket.clone(),
            key: target.key.clone(),
        })
    }

    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<()> {
        self.store
            .upload(local_path, bucket, key)
            .await
            .with_context(|| format!("Failed to upload {} to {}/{}", local_path.display(), bucket, key))
    }
}
