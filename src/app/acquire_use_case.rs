use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::app::ports::{ObjectStorePort, StoredObject};
use crate::error::EtlError;
use crate::observability::metrics::{emit_counter, MetricName};

/// The downloaded source document
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub key: String,
    pub local_path: PathBuf,
    pub bytes: u64,
    pub sha256: String,
}

/// Newest `.xml` object by last-modified time; ties keep the first one listed
pub fn select_newest_xml(objects: &[StoredObject]) -> Option<&StoredObject> {
    let mut newest: Option<&StoredObject> = None;
    for object in objects.iter().filter(|o| o.key.ends_with(".xml")) {
        if newest.map_or(true, |n| object.last_modified > n.last_modified) {
            newest = Some(object);
        }
    }
    newest
}

/// Fetches the newest PubMed export from the input bucket
pub struct AcquireUseCase {
    store: Arc<dyn ObjectStorePort>,
}

impl AcquireUseCase {
    pub fn new(store: Arc<dyn ObjectStorePort>) -> Self {
        Self { store }
    }

    /// Download the newest `.xml` object under `prefix` to `destination`.
    ///
    /// Finding no candidate is fatal: the run cannot proceed without a document.
    pub async fn acquire(&self, bucket: &str, prefix: &str, destination: &Path) -> Result<SourceDocument> {
        let objects = self
            .store
            .list(bucket, prefix)
            .await
            .with_context(|| format!("Failed to list {}/{}", bucket, prefix))?;
        emit_counter(MetricName::SourceObjectsListed, objects.len() as u64);

        let newest = select_newest_xml(&objects).ok_or_else(|| {
            EtlError::SourceNotFound(format!("no .xml object under {}/{}", bucket, prefix))
        })?;
        info!(
            "Selected {} (last modified {}) from {} listed objects",
            newest.key,
            newest.last_modified,
            objects.len()
        );

        let bytes = self
            .store
            .download(bucket, &newest.key, destination)
            .await
            .with_context(|| format!("Failed to download {}", newest.key))?;
        emit_counter(MetricName::SourceBytesDownloaded, bytes);

        let sha256 = file_sha256(destination).await?;
        info!("Source document {} sha256:{}", newest.key, sha256);

        Ok(SourceDocument {
            key: newest.key.clone(),
            local_path: destination.to_path_buf(),
            bytes,
            sha256,
        })
    }
}

async fn file_sha256(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read downloaded document {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::object_store::LocalObjectStore;
    use chrono::{TimeZone, Utc};

    fn object(key: &str, hour: u32) -> StoredObject {
        StoredObject {
            key: key.to_string(),
            last_modified: Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap(),
            size: 1,
        }
    }

    #[test]
    fn test_newest_xml_wins() {
        let objects = vec![
            object("exports/old.xml", 1),
            object("exports/newest.csv", 9),
            object("exports/new.xml", 5),
        ];
        assert_eq!(select_newest_xml(&objects).unwrap().key, "exports/new.xml");
    }

    #[test]
    fn test_tie_keeps_first_listed() {
        let objects = vec![object("a.xml", 3), object("b.xml", 3)];
        assert_eq!(select_newest_xml(&objects).unwrap().key, "a.xml");
    }

    #[test]
    fn test_no_xml_objects() {
        assert!(select_newest_xml(&[object("notes.txt", 1)]).is_none());
        assert!(select_newest_xml(&[]).is_none());
    }

    #[tokio::test]
    async fn test_acquire_without_xml_is_source_not_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("input/exports")).unwrap();
        std::fs::write(dir.path().join("input/exports/readme.txt"), "x").unwrap();

        let use_case = AcquireUseCase::new(Arc::new(LocalObjectStore::new(dir.path())));
        let err = use_case
            .acquire("input", "exports/", &dir.path().join("work/source.xml"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EtlError>(),
            Some(EtlError::SourceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_acquire_downloads_and_hashes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("input/exports")).unwrap();
        std::fs::write(dir.path().join("input/exports/batch.xml"), "abc").unwrap();

        let use_case = AcquireUseCase::new(Arc::new(LocalObjectStore::new(dir.path())));
        let destination = dir.path().join("work/source.xml");
        let document = use_case.acquire("input", "exports/", &destination).await.unwrap();

        assert_eq!(document.key, "exports/batch.xml");
        assert_eq!(document.bytes, 3);
        assert_eq!(
            document.sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(std::fs::read_to_string(destination).unwrap(), "abc");
    }

    #[tokio::test]
    async fn test_digest_of_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(file_sha256(&dir.path().join("absent.xml")).await.is_err());

        let path = dir.path().join("empty.xml");
        std::fs::write(&path, "").unwrap();
        assert_eq!(
            file_sha256(&path).await.unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
