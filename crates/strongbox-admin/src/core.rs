//! Admin operations consumed by the admin UI: install, login, bucket and
//! api-key CRUD, audit query. This is the one seam where the admin surface
//! touches both [`strongbox_metadata::MetadataStore`] (the authoritative
//! rows) and [`strongbox_store::FileStore`] (the bucket directories on disk).

use std::sync::Arc;

use strongbox_auth::permission::{ApiKeyCache, ApiKeyEntry, PermissionEntry};
use strongbox_metadata::MetadataStore;
use strongbox_metadata::models::{AuditFilter, AuditLogRecord, AuditStats, BucketRecord, NewApiKey, PermissionRecord};
use strongbox_store::FileStore;
use strongbox_store::naming::validate_bucket_name;
use tracing::{info, warn};

use crate::error::AdminError;
use crate::ratelimit::LoginRateLimiter;
use crate::session::{Session, SessionStore};

/// Ties the metadata store, file store, api-key cache, session store, and
/// login rate limiter together behind the method-level contract the admin
/// UI is built against.
#[derive(Debug)]
pub struct AdminCore {
    metadata: MetadataStore,
    store: FileStore,
    api_key_cache: Arc<ApiKeyCache>,
    sessions: SessionStore,
    rate_limiter: LoginRateLimiter,
}

impl AdminCore {
    /// Wire an [`AdminCore`] over an already-open metadata store, file
    /// store, and the api-key cache shared with the S3 request path.
    #[must_use]
    pub fn new(metadata: MetadataStore, store: FileStore, api_key_cache: Arc<ApiKeyCache>) -> Self {
        Self {
            metadata,
            store,
            api_key_cache,
            sessions: SessionStore::default(),
            rate_limiter: LoginRateLimiter::new(),
        }
    }

    // -- Installation & auth -------------------------------------------

    /// Whether first-run installation (admin account creation) has completed.
    pub fn is_installed(&self) -> Result<bool, AdminError> {
        Ok(self.metadata.is_installed()?)
    }

    /// Create the first (and only) admin account. Fails if one already exists.
    pub fn install(&self, username: &str, password: &str) -> Result<(), AdminError> {
        if self.metadata.is_installed()? {
            return Err(AdminError::AlreadyInstalled);
        }
        self.metadata.set_admin_password(username, password)?;
        self.metadata.set_installed()?;
        info!(username, "admin account installed");
        Ok(())
    }

    /// Authenticate `username`/`password` from `ip`, returning a fresh
    /// session token. Subject to [`LoginRateLimiter`]; failed attempts count
    /// against `ip` whether the cause is a bad password or a missing account.
    pub fn login(&self, username: &str, password: &str, ip: &str) -> Result<String, AdminError> {
        self.rate_limiter.check(ip)?;

        let configured_username = self.metadata.get_admin_username()?;
        let ok = configured_username.as_deref() == Some(username) && self.metadata.verify_admin_password(password)?;

        if !ok {
            self.rate_limiter.record_failure(ip);
            self.write_audit_best_effort(&strongbox_metadata::audit::audit_entry(
                "AdminLogin",
                username,
                ip,
                "admin/session",
                false,
            ));
            return Err(AdminError::InvalidCredentials);
        }

        self.rate_limiter.record_success(ip);
        let token = self.sessions.issue(username);
        self.write_audit_best_effort(&strongbox_metadata::audit::audit_entry(
            "AdminLogin",
            username,
            ip,
            "admin/session",
            true,
        ));
        Ok(token)
    }

    /// Invalidate a session token (logout). Idempotent.
    pub fn logout(&self, token: &str) {
        self.sessions.revoke(token);
    }

    /// Validate a session token for a protected admin request.
    pub fn authenticate(&self, token: &str) -> Result<Session, AdminError> {
        self.sessions.authenticate(token)
    }

    /// Change the admin password, requiring the current one.
    pub fn change_password(&self, current_password: &str, new_password: &str) -> Result<(), AdminError> {
        if !self.metadata.verify_admin_password(current_password)? {
            return Err(AdminError::InvalidCredentials);
        }
        let username = self.metadata.get_admin_username()?.ok_or(AdminError::NotInstalled)?;
        self.metadata.set_admin_password(&username, new_password)?;
        Ok(())
    }

    // -- Buckets ---------------------------------------------------------

    /// Create a bucket: validates the name, inserts the metadata row, then
    /// creates its on-disk directory. If directory creation fails, the
    /// metadata row is rolled back so the two stores never disagree.
    pub async fn create_bucket(&self, name: &str) -> Result<BucketRecord, AdminError> {
        validate_bucket_name(name)?;
        let record = self.metadata.create_bucket(name)?;
        if let Err(err) = self.store.create_bucket(name).await {
            warn!(bucket = name, error = %err, "rolling back bucket row after directory creation failure");
            let _ = self.metadata.delete_bucket(name);
            return Err(err.into());
        }
        Ok(record)
    }

    /// List every bucket.
    pub fn list_buckets(&self) -> Result<Vec<BucketRecord>, AdminError> {
        Ok(self.metadata.list_buckets()?)
    }

    /// Delete a bucket: the metadata row first (fails if non-empty), then
    /// its on-disk directory.
    pub async fn delete_bucket(&self, name: &str) -> Result<(), AdminError> {
        self.metadata.delete_bucket(name)?;
        self.store.delete_bucket(name).await?;
        Ok(())
    }

    /// Flip a bucket's public-read flag.
    pub fn set_bucket_public(&self, name: &str, is_public: bool) -> Result<(), AdminError> {
        Ok(self.metadata.update_bucket_is_public(name, is_public)?)
    }

    // -- API keys & permissions ------------------------------------------

    /// Create a new api key and refresh the in-process cache so it is
    /// usable for SigV4 verification immediately.
    pub fn create_api_key(&self, description: &str) -> Result<NewApiKey, AdminError> {
        let key = self.metadata.create_api_key(description)?;
        self.reload_api_key_cache()?;
        Ok(key)
    }

    /// List every api key.
    pub fn list_api_keys(&self) -> Result<Vec<strongbox_metadata::models::ApiKeyRecord>, AdminError> {
        Ok(self.metadata.list_api_keys()?)
    }

    /// Enable or disable an api key.
    pub fn set_api_key_enabled(&self, access_key_id: &str, enabled: bool) -> Result<(), AdminError> {
        self.metadata.update_api_key_enabled(access_key_id, enabled)?;
        self.reload_api_key_cache()
    }

    /// Permanently delete an api key and its permission grants.
    pub fn delete_api_key(&self, access_key_id: &str) -> Result<(), AdminError> {
        self.metadata.delete_api_key(access_key_id)?;
        self.reload_api_key_cache()
    }

    /// Replace an api key's secret, returning the new plaintext value.
    pub fn reset_api_key_secret(&self, access_key_id: &str) -> Result<String, AdminError> {
        let secret = self.metadata.reset_api_key_secret(access_key_id)?;
        self.reload_api_key_cache()?;
        Ok(secret)
    }

    /// Grant or update a bucket permission for an api key.
    pub fn set_permission(&self, permission: &PermissionRecord) -> Result<(), AdminError> {
        self.metadata.set_permission(permission)?;
        self.reload_api_key_cache()
    }

    /// Revoke a bucket permission grant.
    pub fn delete_permission(&self, access_key_id: &str, bucket_name: &str) -> Result<(), AdminError> {
        self.metadata.delete_permission(access_key_id, bucket_name)?;
        self.reload_api_key_cache()
    }

    /// List every permission grant held by an api key.
    pub fn list_permissions(&self, access_key_id: &str) -> Result<Vec<PermissionRecord>, AdminError> {
        Ok(self.metadata.list_permissions(access_key_id)?)
    }

    fn reload_api_key_cache(&self) -> Result<(), AdminError> {
        let loaded = self.metadata.load_all_api_keys_with_permissions()?;
        let entries = loaded
            .into_iter()
            .map(|(key, permissions)| ApiKeyEntry {
                access_key_id: key.access_key_id,
                secret_access_key: key.secret_access_key,
                enabled: key.enabled,
                permissions: permissions
                    .into_iter()
                    .map(|p| PermissionEntry {
                        bucket_name: p.bucket_name,
                        can_read: p.can_read,
                        can_write: p.can_write,
                    })
                    .collect(),
            })
            .collect();
        self.api_key_cache.reload(entries);
        Ok(())
    }

    // -- Audit -------------------------------------------------------------

    /// Page through audit log rows.
    pub fn query_audit_logs(&self, filter: &AuditFilter, page: u32, limit: u32) -> Result<Vec<AuditLogRecord>, AdminError> {
        Ok(self.metadata.query_audit_logs(filter, page, limit)?)
    }

    /// Aggregate audit counts for the dashboard.
    pub fn audit_stats(&self) -> Result<AuditStats, AdminError> {
        Ok(self.metadata.audit_stats()?)
    }

    /// Write an audit row, logging (not propagating) any failure: §7's
    /// "audit logs are best-effort" rule applies to every admin-surface
    /// action, not only the S3 wire path.
    pub fn write_audit_best_effort(&self, entry: &AuditLogRecord) {
        if let Err(err) = self.metadata.write_audit_log(entry) {
            warn!(error = %err, action = %entry.action, "failed to write audit log entry");
        }
    }

    /// Periodic housekeeping: drop expired sessions. Intended to be driven
    /// by the same background loop that runs maintenance jobs.
    pub fn purge_expired_sessions(&self) {
        self.sessions.purge_expired();
    }
}
