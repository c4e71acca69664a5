//! Ambient error type for the Strongbox binary and its setup code.
//!
//! Component crates (store, metadata, auth, admin) define their own typed
//! error enums; this type exists for the thin layer above them — config
//! loading, startup, and anything else that only needs to report a cause
//! chain rather than be matched on.

/// Top-level error type for Strongbox bootstrap and configuration.
#[derive(Debug, thiserror::Error)]
pub enum StrongboxError {
    /// Configuration value was missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error with context, propagated from any subsystem.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience result type for Strongbox bootstrap operations.
pub type StrongboxResult<T> = Result<T, StrongboxError>;
