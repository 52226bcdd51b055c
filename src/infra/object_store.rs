use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

use crate::app::ports::{ObjectStorePort, StoredObject};
use crate::error::{EtlError, Result};

/// Object store backed by the local filesystem: one directory per bucket under
/// `root`, keys are `/`-separated paths inside it.
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !safe || bucket.is_empty() || bucket.contains(['/', '\\']) || bucket == ".." {
            return Err(EtlError::Storage {
                message: format!("Invalid object location '{}/{}'", bucket, key),
            });
        }
        Ok(self.root.join(bucket).join(relative))
    }
}

fn key_for(bucket_dir: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(bucket_dir).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    Some(parts.join("/"))
}

#[async_trait]
impl ObjectStorePort for LocalObjectStore {
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<StoredObject>> {
        let bucket_dir = self.root.join(bucket);
        if !tokio::fs::try_exists(&bucket_dir).await? {
            return Err(EtlError::Storage {
                message: format!("Bucket '{}' does not exist under {}", bucket, self.root.display()),
            });
        }

        let mut objects = Vec::new();
        let mut pending = vec![bucket_dir.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let metadata = entry.metadata().await?;
                let path = entry.path();
                if metadata.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Some(key) = key_for(&bucket_dir, &path) else {
                    continue;
                };
                if !key.starts_with(prefix) {
                    continue;
                }
                let last_modified: DateTime<Utc> = metadata.modified()?.into();
                objects.push(StoredObject {
                    key,
                    last_modified,
                    size: metadata.len(),
                });
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        debug!("Listed {} objects in {}/{}", objects.len(), bucket, prefix);
        Ok(objects)
    }

    async fn download(&self, bucket: &str, key: &str, destination: &Path) -> Result<u64> {
        let source = self.object_path(bucket, key)?;
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = tokio::fs::copy(&source, destination).await.map_err(|e| EtlError::Storage {
            message: format!("Failed to download {}/{}: {}", bucket, key, e),
        })?;
        info!("Downloaded {}/{} ({} bytes) to {}", bucket, key, bytes, destination.display());
        Ok(bytes)
    }

    async fn upload(&self, source: &Path, bucket: &str, key: &str) -> Result<()> {
        let target = self.object_path(bucket, key)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(source, &target).await.map_err(|e| EtlError::Storage {
            message: format!("Failed to upload {} to {}/{}: {}", source.display(), bucket, key, e),
        })?;
        info!("Uploaded {} to {}/{}", source.display(), bucket, key);
        Ok(())
    }
}
