//! Garbage collection: abandoned multipart staging directories and object
//! files on disk with no referencing metadata row.
//!
//! Neither pass touches anything under a `dryRun` run; they only report what
//! they *would* do, which the admin surface exposes for an operator to
//! review before committing to a real pass.

use std::collections::HashSet;

use chrono::{Duration, Utc};
use strongbox_metadata::MetadataStore;
use strongbox_store::FileStore;
use tracing::info;

use crate::error::MaintenanceError;

/// Parameters for one GC pass.
#[derive(Debug, Clone, Copy)]
pub struct GcOptions {
    /// Staging directories older than this are considered abandoned.
    pub max_upload_age: Duration,
    /// When `true`, report what would be removed without removing it.
    pub dry_run: bool,
}

impl Default for GcOptions {
    fn default() -> Self {
        Self {
            max_upload_age: Duration::hours(24),
            dry_run: false,
        }
    }
}

/// Outcome of one GC pass.
#[derive(Debug, Clone, Default)]
pub struct GcReport {
    /// Upload ids whose staging directory was removed (or would be, in a dry run).
    pub stale_uploads_removed: Vec<String>,
    /// Bucket-relative paths of files removed (or would be) for having no object row.
    pub orphan_files_removed: Vec<String>,
    /// Total bytes freed (or that would be freed).
    pub bytes_freed: u64,
}

/// Walk every bucket's `.multipart` staging tree and storage tree, removing
/// what is abandoned or unreferenced.
pub async fn run(metadata: &MetadataStore, store: &FileStore, options: GcOptions) -> Result<GcReport, MaintenanceError> {
    let mut report = GcReport::default();
    let buckets = metadata.list_buckets()?;

    for bucket in &buckets {
        for staged in store.list_staged_uploads(&bucket.name).await? {
            let modified: chrono::DateTime<Utc> = staged.modified.into();
            let age = Utc::now().signed_duration_since(modified);
            let has_session = metadata.get_upload(&staged.upload_id).is_ok();
            let is_stale = !has_session || age > options.max_upload_age;
            if !is_stale {
                continue;
            }
            // A metadata row may still exist for an upload whose staging directory
            // predates maxUploadAge (the client stalled mid-upload); drop the row too
            // so CompleteMultipartUpload can't reference parts that no longer exist.
            if has_session && !options.dry_run {
                metadata.delete_upload(&staged.upload_id)?;
            }
            if !options.dry_run {
                store.abort_multipart(&bucket.name, &staged.upload_id).await?;
            }
            report.stale_uploads_removed.push(staged.upload_id);
        }

        let known_paths: HashSet<String> = metadata
            .list_objects(&bucket.name, "", None, None, u32::MAX)?
            .contents
            .iter()
            .map(|object| object.storage_path.clone())
            .collect();

        for file in store.list_object_files(&bucket.name).await? {
            let relative = file.relative_path.to_string_lossy().replace('\\', "/");
            if known_paths.contains(&relative) {
                continue;
            }
            if !options.dry_run {
                store.delete_object(&bucket.name, &file.relative_path).await?;
            }
            report.bytes_freed += file.size;
            report.orphan_files_removed.push(format!("{}/{relative}", bucket.name));
        }
    }

    info!(
        stale_uploads = report.stale_uploads_removed.len(),
        orphan_files = report.orphan_files_removed.len(),
        bytes_freed = report.bytes_freed,
        dry_run = options.dry_run,
        "garbage collection pass complete"
    );

    Ok(report)
}
