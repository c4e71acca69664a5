//! Errors FileStore operations can return.
//!
//! These are the on-disk counterpart of the S3 wire error taxonomy, not the
//! taxonomy itself; the HTTP layer maps them onto the 16 wire error codes.

use thiserror::Error;

/// An error from a [`crate::FileStore`] operation.
#[derive(Debug, Error)]
pub enum FileStoreError {
    /// Underlying filesystem I/O failed.
    #[error("filesystem I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `DeleteBucket` was called on a bucket directory that still holds files.
    #[error("bucket directory is not empty")]
    BucketNotEmpty,

    /// The requested object, part, or upload staging directory does not exist.
    #[error("not found")]
    NotFound,

    /// A bucket or object key failed validation.
    #[error("invalid name: {0}")]
    InvalidName(String),
}
