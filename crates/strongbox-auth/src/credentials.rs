//! Credential resolution for SigV4 verification.
//!
//! Signature verification needs the raw secret key to re-derive the signing
//! key, so it cannot be satisfied by a one-way hash the way a password check
//! can. [`CredentialProvider`] is the seam between this crate (which only
//! knows how to verify a signature given a secret) and whatever backs access
//! keys at rest ([`strongbox_metadata`]'s `api_keys` table, cached in-process
//! by `strongbox_auth::permission`).

use crate::error::AuthError;

/// Resolves an access key id to its secret key.
///
/// Implementations should return [`AuthError::InvalidAccessKeyId`] for unknown
/// or disabled keys rather than panicking or returning an empty string, so
/// that callers produce the correct wire error without a separate existence
/// check.
pub trait CredentialProvider: Send + Sync {
    /// Look up the secret access key for `access_key_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidAccessKeyId`] if the key is unknown or disabled.
    fn get_secret_key(&self, access_key_id: &str) -> Result<String, AuthError>;
}

/// A fixed, in-memory set of access key / secret key pairs.
///
/// Useful for tests and for the single-admin-key bootstrap case; production
/// deployments with more than one key use `strongbox_auth::permission`'s
/// cache, which reloads from the metadata store.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialProvider {
    keys: Vec<(String, String)>,
}

impl StaticCredentialProvider {
    /// Create a provider from a list of `(access_key_id, secret_access_key)` pairs.
    #[must_use]
    pub fn new(keys: Vec<(String, String)>) -> Self {
        Self { keys }
    }
}

impl CredentialProvider for StaticCredentialProvider {
    fn get_secret_key(&self, access_key_id: &str) -> Result<String, AuthError> {
        self.keys
            .iter()
            .find(|(akid, _)| akid == access_key_id)
            .map(|(_, secret)| secret.clone())
            .ok_or(AuthError::InvalidAccessKeyId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_resolve_known_access_key() {
        let provider = StaticCredentialProvider::new(vec![("AKID".to_owned(), "secret".to_owned())]);
        assert_eq!(provider.get_secret_key("AKID").unwrap(), "secret");
    }

    #[test]
    fn test_should_reject_unknown_access_key() {
        let provider = StaticCredentialProvider::new(vec![("AKID".to_owned(), "secret".to_owned())]);
        assert!(matches!(
            provider.get_secret_key("OTHER"),
            Err(AuthError::InvalidAccessKeyId)
        ));
    }
}
