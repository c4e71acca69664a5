//! Errors an [`crate::AdminCore`] operation can return.

use thiserror::Error;

/// An error from an admin-surface operation.
#[derive(Debug, Error)]
pub enum AdminError {
    /// The metadata store rejected the operation.
    #[error("metadata error: {0}")]
    Metadata(#[from] strongbox_metadata::MetadataError),

    /// The filesystem store rejected the operation.
    #[error("storage error: {0}")]
    Store(#[from] strongbox_store::FileStoreError),

    /// A bucket name failed the shared naming rule.
    #[error("invalid bucket name: {0}")]
    InvalidBucketName(#[from] strongbox_store::naming::InvalidBucketName),

    /// First-run installation has not completed yet; only `install` is callable.
    #[error("admin account not installed")]
    NotInstalled,

    /// Installation was attempted on an already-installed instance.
    #[error("admin account already installed")]
    AlreadyInstalled,

    /// Username or password did not match the stored admin account.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The session token is unknown or has expired.
    #[error("invalid or expired session")]
    InvalidSession,

    /// Too many failed login attempts from this source; try again after the cooldown.
    #[error("too many failed login attempts, try again later")]
    RateLimited,
}
