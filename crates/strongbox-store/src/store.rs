//! Filesystem-backed object storage.
//!
//! Every write lands in a temp file under the target bucket's own directory
//! first, is fsync'd, then atomically renamed into place — the temp file and
//! the final file always share a filesystem, so the rename is atomic and a
//! crash mid-write never leaves a partial object visible at the final path.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, trace, warn};

use crate::checksums::{StreamingMd5, compute_multipart_etag};
use crate::error::FileStoreError;
use crate::layout::object_relative_path;

const TMP_DIR: &str = ".tmp";
const MULTIPART_DIR: &str = ".multipart";

/// Outcome of a streaming write: the relative path the bytes landed at
/// (stored verbatim in the `objects`/`parts` metadata row) and the quoted
/// S3-style ETag.
#[derive(Debug, Clone)]
pub struct WriteResult {
    /// Path to the written file, relative to the store's data root.
    pub relative_path: PathBuf,
    /// The ETag: a quoted lowercase hex MD5 for a plain object or part, or a
    /// composite `"<hash>-<N>"` form for an assembled multipart object.
    pub etag: String,
    /// The size written, in bytes.
    pub size: u64,
}

/// Aggregate usage figures for the whole store, used by the admin dashboard
/// and by maintenance jobs deciding whether to warn about low disk space.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskUsage {
    /// Total bytes occupied by object and part files.
    pub total_bytes: u64,
    /// Total number of object and part files.
    pub file_count: u64,
}

/// One object file found while walking a bucket's storage tree, used by the
/// maintenance engine to cross-reference disk contents against metadata rows.
#[derive(Debug, Clone)]
pub struct BucketFile {
    /// Path relative to the bucket's own root, as stored in an object row's `storage_path`.
    pub relative_path: PathBuf,
    /// File size in bytes, as currently on disk.
    pub size: u64,
}

/// One multipart upload's staging directory, found while walking a bucket's
/// `.multipart` tree.
#[derive(Debug, Clone)]
pub struct StagedUpload {
    /// The upload id (the staging directory's name).
    pub upload_id: String,
    /// Last-modified time of the staging directory itself, used to age out
    /// abandoned uploads.
    pub modified: std::time::SystemTime,
}

/// Filesystem-backed object storage rooted at a single data directory.
///
/// Layout under the data root:
///
/// ```text
/// buckets/<bucket>/<sharded-key-path>            # object bodies
/// buckets/<bucket>/.multipart/<uploadId>/<part>  # staging
/// ```
#[derive(Debug, Clone)]
pub struct FileStore {
    data_path: PathBuf,
}

impl FileStore {
    /// Open (but do not create) a store rooted at `data_path`. Callers are
    /// expected to have already created `data_path` during bootstrap.
    #[must_use]
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
        }
    }

    fn bucket_root(&self, bucket: &str) -> PathBuf {
        self.data_path.join("buckets").join(bucket)
    }

    fn tmp_dir(&self, bucket: &str) -> PathBuf {
        self.bucket_root(bucket).join(TMP_DIR)
    }

    fn multipart_dir(&self, bucket: &str, upload_id: &str) -> PathBuf {
        self.bucket_root(bucket).join(MULTIPART_DIR).join(upload_id)
    }

    /// Create the on-disk directory for a new bucket.
    pub async fn create_bucket(&self, bucket: &str) -> Result<(), FileStoreError> {
        let root = self.bucket_root(bucket);
        tokio::fs::create_dir_all(&root).await?;
        tokio::fs::create_dir_all(self.tmp_dir(bucket)).await?;
        debug!(bucket, path = %root.display(), "created bucket directory");
        Ok(())
    }

    /// Remove a bucket's directory. Rejects the removal if any object or
    /// staging file remains; callers must delete every object row (and its
    /// file, via [`Self::delete_object`]) first.
    pub async fn delete_bucket(&self, bucket: &str) -> Result<(), FileStoreError> {
        let root = self.bucket_root(bucket);
        let mut entries = tokio::fs::read_dir(&root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if name == TMP_DIR || name == MULTIPART_DIR {
                continue;
            }
            return Err(FileStoreError::BucketNotEmpty);
        }

        if tokio::fs::try_exists(self.multipart_dir_root(bucket)).await? {
            let mut uploads = tokio::fs::read_dir(self.multipart_dir_root(bucket)).await?;
            if uploads.next_entry().await?.is_some() {
                return Err(FileStoreError::BucketNotEmpty);
            }
            tokio::fs::remove_dir(self.multipart_dir_root(bucket)).await?;
        }
        tokio::fs::remove_dir(self.tmp_dir(bucket)).await?;
        tokio::fs::remove_dir(&root).await?;
        debug!(bucket, "removed bucket directory");
        Ok(())
    }

    fn multipart_dir_root(&self, bucket: &str) -> PathBuf {
        self.bucket_root(bucket).join(MULTIPART_DIR)
    }

    /// Stream `reader` into a new temp file under `bucket`, hashing as it
    /// goes, then fsync and atomically rename it to its final sharded path.
    ///
    /// If any step fails the temp file is removed and no partial object is
    /// left visible.
    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        reader: &mut (impl AsyncRead + Unpin),
    ) -> Result<WriteResult, FileStoreError> {
        let final_relative = object_relative_path(key);
        let final_path = self.bucket_root(bucket).join(&final_relative);
        if let Some(parent) = final_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let (size, md5_hex) = self.stream_to_temp_then_rename(bucket, reader, &final_path).await?;
        trace!(bucket, key, size, "wrote object");

        Ok(WriteResult {
            relative_path: final_relative,
            etag: format!("\"{md5_hex}\""),
            size,
        })
    }

    /// Stream `reader` into a new part file staged under the upload's
    /// private directory.
    pub async fn stage_part(
        &self,
        bucket: &str,
        upload_id: &str,
        part_number: u32,
        reader: &mut (impl AsyncRead + Unpin),
    ) -> Result<WriteResult, FileStoreError> {
        let dir = self.multipart_dir(bucket, upload_id);
        tokio::fs::create_dir_all(&dir).await?;
        let final_path = dir.join(part_number.to_string());

        let (size, md5_hex) = self.stream_to_temp_then_rename(bucket, reader, &final_path).await?;
        trace!(bucket, upload_id, part_number, size, "staged part");

        Ok(WriteResult {
            relative_path: final_path
                .strip_prefix(self.bucket_root(bucket))
                .unwrap_or(&final_path)
                .to_path_buf(),
            etag: format!("\"{md5_hex}\""),
            size,
        })
    }

    /// Core streaming write shared by [`Self::put_object`] and
    /// [`Self::stage_part`]: write to a fresh temp file in the bucket's own
    /// `.tmp` directory, fsync, then atomically rename to `final_path`.
    async fn stream_to_temp_then_rename(
        &self,
        bucket: &str,
        reader: &mut (impl AsyncRead + Unpin),
        final_path: &Path,
    ) -> Result<(u64, String), FileStoreError> {
        let tmp_path = self.tmp_dir(bucket).join(uuid::Uuid::new_v4().to_string());
        let result = self.write_temp_file(reader, &tmp_path).await;

        match result {
            Ok((size, md5_hex)) => {
                tokio::fs::rename(&tmp_path, final_path).await?;
                Ok((size, md5_hex))
            }
            Err(err) => {
                if let Err(remove_err) = tokio::fs::remove_file(&tmp_path).await {
                    if remove_err.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %tmp_path.display(), error = %remove_err, "failed to remove temp file after write error");
                    }
                }
                Err(err)
            }
        }
    }

    async fn write_temp_file(
        &self,
        reader: &mut (impl AsyncRead + Unpin),
        tmp_path: &Path,
    ) -> Result<(u64, String), FileStoreError> {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(tmp_path)
            .await?;

        let mut hasher = StreamingMd5::new();
        let mut buf = [0_u8; 64 * 1024];
        let mut size: u64 = 0;
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            file.write_all(&buf[..n]).await?;
            size += n as u64;
        }
        file.sync_all().await?;

        Ok((size, hasher.finish_hex()))
    }

    /// Open the file backing `relative_path` under `bucket` for a streaming read.
    pub async fn get_object(&self, bucket: &str, relative_path: &Path) -> Result<tokio::fs::File, FileStoreError> {
        let path = self.bucket_root(bucket).join(relative_path);
        tokio::fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FileStoreError::NotFound
            } else {
                FileStoreError::Io(e)
            }
        })
    }

    /// Delete the file backing `relative_path`. Idempotent: deleting a path
    /// that is already gone is not an error, matching the metadata-row
    /// delete-then-file-delete ordering described for objects.
    pub async fn delete_object(&self, bucket: &str, relative_path: &Path) -> Result<(), FileStoreError> {
        let path = self.bucket_root(bucket).join(relative_path);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FileStoreError::Io(e)),
        }
    }

    /// Concatenate staged parts (in the given order) into a temp file,
    /// compute the composite multipart ETag, atomically rename the result to
    /// its final object path, then remove the now-empty staging directory.
    pub async fn assemble_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_numbers: &[u32],
    ) -> Result<WriteResult, FileStoreError> {
        let final_relative = object_relative_path(key);
        let final_path = self.bucket_root(bucket).join(&final_relative);
        if let Some(parent) = final_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp_path = self.tmp_dir(bucket).join(uuid::Uuid::new_v4().to_string());
        let assemble_result = self
            .concatenate_parts(bucket, upload_id, part_numbers, &tmp_path)
            .await;

        let (size, part_digests) = match assemble_result {
            Ok(v) => v,
            Err(err) => {
                let _ = tokio::fs::remove_file(&tmp_path).await;
                return Err(err);
            }
        };

        tokio::fs::rename(&tmp_path, &final_path).await?;
        self.remove_multipart_dir(bucket, upload_id).await?;

        let etag = format!("\"{}\"", compute_multipart_etag(&part_digests));
        trace!(bucket, key, upload_id, size, "assembled multipart object");

        Ok(WriteResult {
            relative_path: final_relative,
            etag,
            size,
        })
    }

    async fn concatenate_parts(
        &self,
        bucket: &str,
        upload_id: &str,
        part_numbers: &[u32],
        tmp_path: &Path,
    ) -> Result<(u64, Vec<[u8; 16]>), FileStoreError> {
        let mut out = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(tmp_path)
            .await?;

        let mut total_size: u64 = 0;
        let mut part_digests = Vec::with_capacity(part_numbers.len());
        let dir = self.multipart_dir(bucket, upload_id);

        for &part_number in part_numbers {
            let part_path = dir.join(part_number.to_string());
            let mut part_file = tokio::fs::File::open(&part_path).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    FileStoreError::NotFound
                } else {
                    FileStoreError::Io(e)
                }
            })?;

            let mut hasher = StreamingMd5::new();
            let mut buf = [0_u8; 64 * 1024];
            loop {
                let n = part_file.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                hasher.update(&buf[..n]);
                out.write_all(&buf[..n]).await?;
                total_size += n as u64;
            }
            part_digests.push(hasher.finish_bytes());
        }
        out.sync_all().await?;

        Ok((total_size, part_digests))
    }

    /// Discard every part staged for `upload_id`, removing its staging
    /// directory entirely. Called when a multipart upload is aborted or
    /// expires.
    pub async fn abort_multipart(&self, bucket: &str, upload_id: &str) -> Result<(), FileStoreError> {
        self.remove_multipart_dir(bucket, upload_id).await
    }

    async fn remove_multipart_dir(&self, bucket: &str, upload_id: &str) -> Result<(), FileStoreError> {
        let dir = self.multipart_dir(bucket, upload_id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FileStoreError::Io(e)),
        }
    }

    /// Walk every bucket directory and sum the size and count of object and
    /// part files, skipping staging directories.
    pub async fn disk_usage(&self) -> Result<DiskUsage, FileStoreError> {
        let buckets_root = self.data_path.join("buckets");
        let mut usage = DiskUsage::default();
        if !tokio::fs::try_exists(&buckets_root).await? {
            return Ok(usage);
        }

        let mut stack = vec![buckets_root];
        while let Some(dir) = stack.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    stack.push(entry.path());
                } else if file_type.is_file() {
                    usage.total_bytes += entry.metadata().await?.len();
                    usage.file_count += 1;
                }
            }
        }
        Ok(usage)
    }

    /// List every object file under `bucket`'s storage root, skipping the
    /// `.tmp` and `.multipart` staging areas. Used by the maintenance
    /// engine's garbage collector and integrity checker to cross-reference
    /// disk contents against metadata rows.
    pub async fn list_object_files(&self, bucket: &str) -> Result<Vec<BucketFile>, FileStoreError> {
        let root = self.bucket_root(bucket);
        let mut files = Vec::new();
        if !tokio::fs::try_exists(&root).await? {
            return Ok(files);
        }

        let mut stack = vec![root.clone()];
        while let Some(dir) = stack.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                if dir == root && matches!(entry.file_name().to_str(), Some(TMP_DIR) | Some(MULTIPART_DIR)) {
                    continue;
                }
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    stack.push(entry.path());
                } else if file_type.is_file() {
                    let path = entry.path();
                    let relative_path = path.strip_prefix(&root).unwrap_or(&path).to_path_buf();
                    files.push(BucketFile {
                        relative_path,
                        size: entry.metadata().await?.len(),
                    });
                }
            }
        }
        Ok(files)
    }

    /// List every in-progress multipart upload's staging directory under `bucket`.
    pub async fn list_staged_uploads(&self, bucket: &str) -> Result<Vec<StagedUpload>, FileStoreError> {
        let root = self.multipart_dir_root(bucket);
        let mut uploads = Vec::new();
        if !tokio::fs::try_exists(&root).await? {
            return Ok(uploads);
        }

        let mut entries = tokio::fs::read_dir(&root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let Some(upload_id) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            uploads.push(StagedUpload {
                upload_id,
                modified: entry.metadata().await?.modified()?,
            });
        }
        Ok(uploads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    async fn new_store() -> (FileStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.create_bucket("test-bucket").await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_should_put_and_get_object_round_trip() {
        let (store, _dir) = new_store().await;
        let result = store
            .put_object("test-bucket", "hello.txt", &mut Cursor::new(b"hello world".to_vec()))
            .await
            .unwrap();
        assert_eq!(result.size, 11);
        assert!(result.etag.starts_with('"') && result.etag.ends_with('"'));

        let mut file = store.get_object("test-bucket", &result.relative_path).await.unwrap();
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"hello world");
    }

    #[tokio::test]
    async fn test_should_leave_no_temp_file_after_successful_put() {
        let (store, dir) = new_store().await;
        store
            .put_object("test-bucket", "k", &mut Cursor::new(b"data".to_vec()))
            .await
            .unwrap();

        let tmp_dir = dir.path().join("buckets/test-bucket/.tmp");
        let mut entries = tokio::fs::read_dir(&tmp_dir).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_should_return_not_found_for_missing_object() {
        let (store, _dir) = new_store().await;
        let err = store
            .get_object("test-bucket", Path::new("aa/bb/nonexistent"))
            .await
            .unwrap_err();
        assert!(matches!(err, FileStoreError::NotFound));
    }

    #[tokio::test]
    async fn test_should_delete_object_idempotently() {
        let (store, _dir) = new_store().await;
        let result = store
            .put_object("test-bucket", "k", &mut Cursor::new(b"data".to_vec()))
            .await
            .unwrap();
        store.delete_object("test-bucket", &result.relative_path).await.unwrap();
        store.delete_object("test-bucket", &result.relative_path).await.unwrap();
    }

    #[tokio::test]
    async fn test_should_reject_deleting_nonempty_bucket() {
        let (store, _dir) = new_store().await;
        store
            .put_object("test-bucket", "k", &mut Cursor::new(b"data".to_vec()))
            .await
            .unwrap();
        let err = store.delete_bucket("test-bucket").await.unwrap_err();
        assert!(matches!(err, FileStoreError::BucketNotEmpty));
    }

    #[tokio::test]
    async fn test_should_delete_empty_bucket() {
        let (store, _dir) = new_store().await;
        store.delete_bucket("test-bucket").await.unwrap();
    }

    #[tokio::test]
    async fn test_should_stage_and_assemble_multipart_parts() {
        let (store, _dir) = new_store().await;
        let part1 = store
            .stage_part("test-bucket", "upload-1", 1, &mut Cursor::new(b"hello ".to_vec()))
            .await
            .unwrap();
        let part2 = store
            .stage_part("test-bucket", "upload-1", 2, &mut Cursor::new(b"world".to_vec()))
            .await
            .unwrap();
        assert_ne!(part1.etag, part2.etag);

        let result = store
            .assemble_parts("test-bucket", "combined.txt", "upload-1", &[1, 2])
            .await
            .unwrap();
        assert_eq!(result.size, 11);
        assert!(result.etag.starts_with('"') && result.etag.ends_with("-2\""));

        let mut file = store.get_object("test-bucket", &result.relative_path).await.unwrap();
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"hello world");
    }

    #[tokio::test]
    async fn test_should_remove_staging_dir_after_assemble() {
        let (store, dir) = new_store().await;
        store
            .stage_part("test-bucket", "upload-2", 1, &mut Cursor::new(b"x".to_vec()))
            .await
            .unwrap();
        store
            .assemble_parts("test-bucket", "obj", "upload-2", &[1])
            .await
            .unwrap();

        let staging = dir.path().join("buckets/test-bucket/.multipart/upload-2");
        assert!(!tokio::fs::try_exists(&staging).await.unwrap());
    }

    #[tokio::test]
    async fn test_should_abort_multipart_and_remove_staged_parts() {
        let (store, dir) = new_store().await;
        store
            .stage_part("test-bucket", "upload-3", 1, &mut Cursor::new(b"x".to_vec()))
            .await
            .unwrap();
        store.abort_multipart("test-bucket", "upload-3").await.unwrap();

        let staging = dir.path().join("buckets/test-bucket/.multipart/upload-3");
        assert!(!tokio::fs::try_exists(&staging).await.unwrap());
    }

    #[tokio::test]
    async fn test_should_report_disk_usage_across_buckets() {
        let (store, _dir) = new_store().await;
        store
            .put_object("test-bucket", "a", &mut Cursor::new(b"12345".to_vec()))
            .await
            .unwrap();
        store
            .put_object("test-bucket", "b", &mut Cursor::new(b"1234567890".to_vec()))
            .await
            .unwrap();

        let usage = store.disk_usage().await.unwrap();
        assert_eq!(usage.file_count, 2);
        assert_eq!(usage.total_bytes, 15);
    }

    #[tokio::test]
    async fn test_should_list_object_files_excluding_staging_dirs() {
        let (store, _dir) = new_store().await;
        store
            .put_object("test-bucket", "a", &mut Cursor::new(b"12345".to_vec()))
            .await
            .unwrap();
        store
            .stage_part("test-bucket", "upload-1", 1, &mut Cursor::new(b"x".to_vec()))
            .await
            .unwrap();

        let files = store.list_object_files("test-bucket").await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].size, 5);
    }

    #[tokio::test]
    async fn test_should_list_staged_uploads() {
        let (store, _dir) = new_store().await;
        store
            .stage_part("test-bucket", "upload-1", 1, &mut Cursor::new(b"x".to_vec()))
            .await
            .unwrap();
        store
            .stage_part("test-bucket", "upload-2", 1, &mut Cursor::new(b"y".to_vec()))
            .await
            .unwrap();

        let mut uploads = store.list_staged_uploads("test-bucket").await.unwrap();
        uploads.sort_by(|a, b| a.upload_id.cmp(&b.upload_id));
        assert_eq!(uploads.len(), 2);
        assert_eq!(uploads[0].upload_id, "upload-1");
        assert_eq!(uploads[1].upload_id, "upload-2");
    }

    #[tokio::test]
    async fn test_should_return_empty_lists_for_bucket_with_no_content() {
        let (store, _dir) = new_store().await;
        assert!(store.list_object_files("test-bucket").await.unwrap().is_empty());
        assert!(store.list_staged_uploads("test-bucket").await.unwrap().is_empty());
    }
}
