//! Filesystem-backed object storage engine for Strongbox.
//!
//! Owns the on-disk layout under the configured data directory, streaming
//! writes and reads, MD5-based ETag computation, and multipart upload
//! staging. This crate knows nothing about buckets or objects as database
//! rows — that bookkeeping lives in `strongbox-metadata`; this crate only
//! ever deals in bytes on disk.
//!
//! # Modules
//!
//! - [`store`] - [`FileStore`], the main entry point
//! - [`checksums`] - MD5/ETag computation, including the composite multipart form
//! - [`layout`] - object key to on-disk path mapping
//! - [`naming`] - shared bucket-name validation
//! - [`error`] - [`FileStoreError`]

pub mod checksums;
pub mod error;
pub mod layout;
pub mod naming;
pub mod store;

pub use error::FileStoreError;
pub use naming::validate_bucket_name;
pub use store::{BucketFile, DiskUsage, FileStore, StagedUpload, WriteResult};
