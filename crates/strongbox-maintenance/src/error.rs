//! Errors a maintenance job can return.

use thiserror::Error;

/// An error from garbage collection, integrity check/repair, or migration.
#[derive(Debug, Error)]
pub enum MaintenanceError {
    /// The metadata store rejected an operation.
    #[error("metadata error: {0}")]
    Metadata(#[from] strongbox_metadata::MetadataError),

    /// The filesystem store rejected an operation.
    #[error("storage error: {0}")]
    Store(#[from] strongbox_store::FileStoreError),

    /// The requested job id is not known (never existed or has been pruned).
    #[error("no such job: {0}")]
    NoSuchJob(String),

    /// The migration source endpoint could not be reached or returned an
    /// unexpected response while validating the job before it starts.
    #[error("source unreachable: {0}")]
    SourceUnreachable(String),

    /// The source returned a response this engine could not parse.
    #[error("invalid source response: {0}")]
    InvalidSourceResponse(String),

    /// A network or I/O failure while transferring an object.
    #[error("transfer error: {0}")]
    Transfer(String),
}
