//! Errors a [`crate::MetadataStore`] operation can return.

use thiserror::Error;

/// An error from a metadata store operation.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The underlying SQLite connection or query failed.
    #[error("database error: {0}")]
    Connection(#[from] rusqlite::Error),

    /// Failed to check out a pooled connection.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// `Bucket::Create` was called for a name that already exists.
    #[error("bucket already exists")]
    BucketAlreadyExists,

    /// The named bucket has no row.
    #[error("no such bucket")]
    NoSuchBucket,

    /// `Bucket::Delete` was called on a bucket that still has objects.
    #[error("bucket is not empty")]
    BucketNotEmpty,

    /// The requested object key has no row.
    #[error("no such key")]
    NoSuchKey,

    /// The requested upload id has no session row.
    #[error("no such upload")]
    NoSuchUpload,

    /// A part referenced in `CompleteMultipartUpload` was not found, was out
    /// of order, below the minimum part size, or had a mismatched ETag.
    #[error("invalid part: {0}")]
    InvalidPart(String),

    /// The requested access key id has no row.
    #[error("no such api key")]
    NoSuchApiKey,

    /// A value failed application-level validation before reaching SQL.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
