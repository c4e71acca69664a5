//! In-process api-key cache and bucket permission evaluation.
//!
//! Signature verification only needs a secret key; deciding whether the
//! signer may actually touch a given bucket is a second, separate check this
//! module performs once [`crate::sigv4::verify_sigv4`] (or
//! [`crate::presigned::verify_presigned`]) has already confirmed the request
//! was signed by that access key.
//!
//! The cache is a snapshot-then-swap structure rather than a mutable shared
//! map: readers take a cheap `Arc` clone of the current snapshot and never
//! block on a writer, and [`ApiKeyCache::reload`] installs a whole new
//! snapshot atomically after any api-key or permission mutation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::credentials::CredentialProvider;
use crate::error::AuthError;

/// A single bucket permission grant for an access key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionEntry {
    /// The bucket name this grant applies to, or `"*"` for all buckets.
    pub bucket_name: String,
    /// Whether the key may read objects in this bucket.
    pub can_read: bool,
    /// Whether the key may write objects in this bucket.
    pub can_write: bool,
}

/// One api-key row as loaded from the metadata store.
#[derive(Debug, Clone)]
pub struct ApiKeyEntry {
    /// The access key id.
    pub access_key_id: String,
    /// The secret access key.
    pub secret_access_key: String,
    /// Whether this key currently accepts requests.
    pub enabled: bool,
    /// The permission grants held by this key. Evaluation is a union over all rows.
    pub permissions: Vec<PermissionEntry>,
}

#[derive(Debug, Clone)]
struct CachedKey {
    secret_access_key: String,
    enabled: bool,
    permissions: Vec<PermissionEntry>,
}

/// Snapshot-then-swap cache of api keys and their bucket permissions.
#[derive(Debug)]
pub struct ApiKeyCache {
    snapshot: RwLock<Arc<HashMap<String, CachedKey>>>,
}

impl Default for ApiKeyCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiKeyCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    /// Replace the entire cache contents with `entries`, atomically.
    ///
    /// Called once at startup and again after any api-key or permission
    /// mutation (`CREATE`/`UPDATE`/`DELETE` on either table).
    pub fn reload(&self, entries: Vec<ApiKeyEntry>) {
        let map: HashMap<String, CachedKey> = entries
            .into_iter()
            .map(|entry| {
                (
                    entry.access_key_id,
                    CachedKey {
                        secret_access_key: entry.secret_access_key,
                        enabled: entry.enabled,
                        permissions: entry.permissions,
                    },
                )
            })
            .collect();
        *self.snapshot.write() = Arc::new(map);
    }

    /// Evaluate whether `access_key_id` may perform a read or write on `bucket`.
    ///
    /// Looks up the permission rows for the exact bucket name and the `"*"`
    /// wildcard and takes the union: the action is allowed if either row
    /// grants it.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidAccessKeyId`] if the key is unknown or
    /// disabled, and [`AuthError::AccessDenied`] if no permission row grants
    /// the requested action.
    pub fn evaluate_permission(
        &self,
        access_key_id: &str,
        bucket: &str,
        is_write: bool,
    ) -> Result<(), AuthError> {
        let snapshot = self.snapshot.read().clone();
        let key = snapshot
            .get(access_key_id)
            .filter(|k| k.enabled)
            .ok_or(AuthError::InvalidAccessKeyId)?;

        let granted = key.permissions.iter().any(|perm| {
            (perm.bucket_name == "*" || perm.bucket_name == bucket)
                && if is_write { perm.can_write } else { perm.can_read }
        });

        if granted {
            Ok(())
        } else {
            Err(AuthError::AccessDenied)
        }
    }
}

impl CredentialProvider for ApiKeyCache {
    fn get_secret_key(&self, access_key_id: &str) -> Result<String, AuthError> {
        let snapshot = self.snapshot.read().clone();
        snapshot
            .get(access_key_id)
            .filter(|k| k.enabled)
            .map(|k| k.secret_access_key.clone())
            .ok_or(AuthError::InvalidAccessKeyId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> ApiKeyEntry {
        ApiKeyEntry {
            access_key_id: "AKID".to_owned(),
            secret_access_key: "secret".to_owned(),
            enabled: true,
            permissions: vec![PermissionEntry {
                bucket_name: "my-bucket".to_owned(),
                can_read: true,
                can_write: false,
            }],
        }
    }

    #[test]
    fn test_should_resolve_secret_key_after_reload() {
        let cache = ApiKeyCache::new();
        cache.reload(vec![sample_entry()]);
        assert_eq!(cache.get_secret_key("AKID").unwrap(), "secret");
    }

    #[test]
    fn test_should_reject_unknown_key_before_reload() {
        let cache = ApiKeyCache::new();
        assert!(matches!(
            cache.get_secret_key("AKID"),
            Err(AuthError::InvalidAccessKeyId)
        ));
    }

    #[test]
    fn test_should_reject_disabled_key() {
        let cache = ApiKeyCache::new();
        let mut entry = sample_entry();
        entry.enabled = false;
        cache.reload(vec![entry]);
        assert!(matches!(
            cache.get_secret_key("AKID"),
            Err(AuthError::InvalidAccessKeyId)
        ));
    }

    #[test]
    fn test_should_grant_read_but_deny_write() {
        let cache = ApiKeyCache::new();
        cache.reload(vec![sample_entry()]);
        assert!(cache.evaluate_permission("AKID", "my-bucket", false).is_ok());
        assert!(matches!(
            cache.evaluate_permission("AKID", "my-bucket", true),
            Err(AuthError::AccessDenied)
        ));
    }

    #[test]
    fn test_should_deny_unrelated_bucket() {
        let cache = ApiKeyCache::new();
        cache.reload(vec![sample_entry()]);
        assert!(matches!(
            cache.evaluate_permission("AKID", "other-bucket", false),
            Err(AuthError::AccessDenied)
        ));
    }

    #[test]
    fn test_should_honor_wildcard_bucket_permission() {
        let cache = ApiKeyCache::new();
        cache.reload(vec![ApiKeyEntry {
            access_key_id: "AKID".to_owned(),
            secret_access_key: "secret".to_owned(),
            enabled: true,
            permissions: vec![PermissionEntry {
                bucket_name: "*".to_owned(),
                can_read: true,
                can_write: true,
            }],
        }]);
        assert!(cache.evaluate_permission("AKID", "anything", true).is_ok());
    }

    #[test]
    fn test_should_replace_snapshot_on_reload() {
        let cache = ApiKeyCache::new();
        cache.reload(vec![sample_entry()]);
        cache.reload(vec![]);
        assert!(matches!(
            cache.get_secret_key("AKID"),
            Err(AuthError::InvalidAccessKeyId)
        ));
    }
}
