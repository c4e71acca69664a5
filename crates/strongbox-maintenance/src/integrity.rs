//! Integrity scan: cross-reference every object row against the file it
//! claims to back, optionally repairing what scanning finds.

use tokio::io::AsyncReadExt;
use tracing::warn;

use strongbox_metadata::MetadataStore;
use strongbox_metadata::models::ObjectRecord;
use strongbox_store::FileStore;

use crate::error::MaintenanceError;

/// One discrepancy found between a metadata row and the file it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Issue {
    /// A file on disk has no object row referencing it.
    OrphanFile { bucket: String, relative_path: String },
    /// An object row's `storage_path` does not exist on disk.
    MissingFile { bucket: String, key: String },
    /// The file's size on disk does not match the row's recorded size.
    SizeMismatch { bucket: String, key: String, recorded: u64, actual: u64 },
    /// The file's recomputed MD5 does not match the row's recorded ETag.
    EtagMismatch { bucket: String, key: String, recorded: String, actual: String },
}

/// Whether to re-hash every object's bytes to verify its ETag. Off by
/// default since it reads every object in full; a size-only pass is O(stat).
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    /// Recompute and compare the MD5 ETag of every object, not just its size.
    pub verify_etag: bool,
}

/// Scan every bucket for the four issue kinds. Read-only: never touches disk
/// or the metadata store.
pub async fn scan(metadata: &MetadataStore, store: &FileStore, options: ScanOptions) -> Result<Vec<Issue>, MaintenanceError> {
    let mut issues = Vec::new();

    for bucket in metadata.list_buckets()? {
        let mut known_paths = std::collections::HashSet::new();

        for object in metadata.list_objects(&bucket.name, "", None, None, u32::MAX)?.contents {
            known_paths.insert(object.storage_path.clone());
            if let Some(issue) = check_object(store, &bucket.name, &object, options).await? {
                issues.push(issue);
            }
        }

        for file in store.list_object_files(&bucket.name).await? {
            let relative = file.relative_path.to_string_lossy().replace('\\', "/");
            if !known_paths.contains(&relative) {
                issues.push(Issue::OrphanFile { bucket: bucket.name.clone(), relative_path: relative });
            }
        }
    }

    Ok(issues)
}

async fn check_object(
    store: &FileStore,
    bucket: &str,
    object: &ObjectRecord,
    options: ScanOptions,
) -> Result<Option<Issue>, MaintenanceError> {
    let relative_path = std::path::Path::new(&object.storage_path);
    let mut file = match store.get_object(bucket, relative_path).await {
        Ok(file) => file,
        Err(strongbox_store::FileStoreError::NotFound) => {
            return Ok(Some(Issue::MissingFile { bucket: bucket.to_owned(), key: object.key.clone() }));
        }
        Err(err) => return Err(err.into()),
    };

    let actual_size = file.metadata().await.map(|meta| meta.len()).map_err(strongbox_store::FileStoreError::Io)?;
    if actual_size != object.size {
        return Ok(Some(Issue::SizeMismatch {
            bucket: bucket.to_owned(),
            key: object.key.clone(),
            recorded: object.size,
            actual: actual_size,
        }));
    }

    if options.verify_etag {
        let mut buf = Vec::with_capacity(actual_size as usize);
        file.read_to_end(&mut buf).await.map_err(strongbox_store::FileStoreError::Io)?;
        let actual_etag = format!("\"{}\"", strongbox_store::checksums::compute_md5_hex(&buf));
        if actual_etag != object.etag {
            return Ok(Some(Issue::EtagMismatch {
                bucket: bucket.to_owned(),
                key: object.key.clone(),
                recorded: object.etag.clone(),
                actual: actual_etag,
            }));
        }
    }

    Ok(None)
}

/// Apply the repairable subset of `issues`: delete orphan files, delete rows
/// whose file is missing, and re-sync size from disk for a size mismatch.
/// `EtagMismatch` is never auto-repaired; it is left for a human to decide
/// whether the row or the file is correct.
pub async fn repair(metadata: &MetadataStore, store: &FileStore, issues: &[Issue]) -> Result<usize, MaintenanceError> {
    let mut repaired = 0;

    for issue in issues {
        match issue {
            Issue::OrphanFile { bucket, relative_path } => {
                store.delete_object(bucket, std::path::Path::new(relative_path)).await?;
                repaired += 1;
            }
            Issue::MissingFile { bucket, key } => {
                metadata.delete_object(bucket, key)?;
                repaired += 1;
            }
            Issue::SizeMismatch { bucket, key, .. } => {
                let mut object = metadata.get_object(bucket, key)?;
                let relative_path = std::path::Path::new(&object.storage_path);
                let file = store.get_object(bucket, relative_path).await?;
                object.size = file.metadata().await.map(|meta| meta.len()).map_err(strongbox_store::FileStoreError::Io)?;
                metadata.put_object(&object)?;
                repaired += 1;
            }
            Issue::EtagMismatch { .. } => {
                warn!(?issue, "etag mismatch left for manual repair");
            }
        }
    }

    Ok(repaired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::Path;

    async fn new_fixtures() -> (MetadataStore, FileStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let metadata = MetadataStore::open_with_read_pool_size(Path::new(":memory:"), 1).unwrap();
        let store = FileStore::new(dir.path());
        metadata.create_bucket("b").unwrap();
        store.create_bucket("b").await.unwrap();
        (metadata, store, dir)
    }

    async fn put(metadata: &MetadataStore, store: &FileStore, key: &str, data: &[u8]) -> ObjectRecord {
        let write = store.put_object("b", key, &mut std::io::Cursor::new(data)).await.unwrap();
        let record = ObjectRecord {
            bucket: "b".to_owned(),
            key: key.to_owned(),
            size: write.size,
            etag: write.etag,
            content_type: "application/octet-stream".to_owned(),
            storage_path: write.relative_path.to_string_lossy().into_owned(),
            last_modified: Utc::now(),
        };
        metadata.put_object(&record).unwrap();
        record
    }

    #[tokio::test]
    async fn test_should_find_no_issues_in_a_consistent_store() {
        let (metadata, store, _dir) = new_fixtures().await;
        put(&metadata, &store, "a.txt", b"hello").await;

        let issues = scan(&metadata, &store, ScanOptions::default()).await.unwrap();
        assert!(issues.is_empty());
    }

    #[tokio::test]
    async fn test_should_detect_orphan_file() {
        let (metadata, store, _dir) = new_fixtures().await;
        store.put_object("b", "ghost.bin", &mut std::io::Cursor::new(b"x".to_vec())).await.unwrap();

        let issues = scan(&metadata, &store, ScanOptions::default()).await.unwrap();
        assert!(matches!(issues.as_slice(), [Issue::OrphanFile { .. }]));
    }

    #[tokio::test]
    async fn test_should_detect_missing_file() {
        let (metadata, store, _dir) = new_fixtures().await;
        let record = put(&metadata, &store, "a.txt", b"hello").await;
        store.delete_object("b", Path::new(&record.storage_path)).await.unwrap();

        let issues = scan(&metadata, &store, ScanOptions::default()).await.unwrap();
        assert!(matches!(issues.as_slice(), [Issue::MissingFile { key, .. }] if key == "a.txt"));
    }

    #[tokio::test]
    async fn test_should_detect_size_mismatch() {
        let (metadata, store, _dir) = new_fixtures().await;
        let mut record = put(&metadata, &store, "a.txt", b"hello").await;
        record.size = 999;
        metadata.put_object(&record).unwrap();

        let issues = scan(&metadata, &store, ScanOptions::default()).await.unwrap();
        assert!(matches!(issues.as_slice(), [Issue::SizeMismatch { recorded: 999, actual: 5, .. }]));
    }

    #[tokio::test]
    async fn test_should_detect_etag_mismatch_only_when_requested() {
        let (metadata, store, _dir) = new_fixtures().await;
        let mut record = put(&metadata, &store, "a.txt", b"hello").await;
        record.etag = "\"deadbeef\"".to_owned();
        metadata.put_object(&record).unwrap();

        let without_etag = scan(&metadata, &store, ScanOptions::default()).await.unwrap();
        assert!(without_etag.is_empty());

        let with_etag = scan(&metadata, &store, ScanOptions { verify_etag: true }).await.unwrap();
        assert!(matches!(with_etag.as_slice(), [Issue::EtagMismatch { .. }]));
    }

    #[tokio::test]
    async fn test_should_repair_orphan_and_missing_but_leave_etag_mismatch() {
        let (metadata, store, _dir) = new_fixtures().await;
        store.put_object("b", "ghost.bin", &mut std::io::Cursor::new(b"x".to_vec())).await.unwrap();
        let mut etag_mismatch = put(&metadata, &store, "a.txt", b"hello").await;
        etag_mismatch.etag = "\"deadbeef\"".to_owned();
        metadata.put_object(&etag_mismatch).unwrap();

        let issues = scan(&metadata, &store, ScanOptions { verify_etag: true }).await.unwrap();
        let repaired = repair(&metadata, &store, &issues).await.unwrap();

        assert_eq!(repaired, 1);
        assert_eq!(store.list_object_files("b").await.unwrap().len(), 1);
        assert_eq!(metadata.get_object("b", "a.txt").unwrap().etag, "\"deadbeef\"");
    }
}
