//! Runtime settings and admin credentials.
//!
//! Settings are an untyped key/value table (§6's enumerated key names);
//! callers are expected to parse/format the string value for the type a
//! given key holds. Admin password handling is the one place this crate
//! hashes a secret: `VerifyAdminPassword` only ever needs an equality check,
//! unlike api-key secrets which must stay retrievable for SigV4 signing.

use rusqlite::{OptionalExtension, params};

use crate::error::MetadataError;
use crate::store::MetadataStore;

/// The `system.installed` setting key.
pub const SETTING_SYSTEM_INSTALLED: &str = "system.installed";
/// The `admin.username` setting key.
pub const SETTING_ADMIN_USERNAME: &str = "admin.username";
/// The `admin.password_bcrypt` setting key.
pub const SETTING_ADMIN_PASSWORD_BCRYPT: &str = "admin.password_bcrypt";

const BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;

impl MetadataStore {
    /// Fetch a setting's raw string value.
    pub fn get_setting(&self, key: &str) -> Result<Option<String>, MetadataError> {
        let conn = self.read_pool.get()?;
        conn.query_row("SELECT value FROM settings WHERE key = ?1", params![key], |row| row.get(0))
            .optional()
            .map_err(MetadataError::Connection)
    }

    /// Upsert a setting's raw string value.
    pub fn set_setting(&self, key: &str, value: &str) -> Result<(), MetadataError> {
        let conn = self.write_pool.get()?;
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT (key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Whether first-run installation (admin account creation) has completed.
    pub fn is_installed(&self) -> Result<bool, MetadataError> {
        Ok(self.get_setting(SETTING_SYSTEM_INSTALLED)?.as_deref() == Some("true"))
    }

    /// Mark first-run installation complete and record when it happened.
    pub fn set_installed(&self) -> Result<(), MetadataError> {
        self.set_setting(SETTING_SYSTEM_INSTALLED, "true")?;
        self.set_setting("system.installed_at", &chrono::Utc::now().to_rfc3339())
    }

    /// Fetch the configured admin username, if installation has happened.
    pub fn get_admin_username(&self) -> Result<Option<String>, MetadataError> {
        self.get_setting(SETTING_ADMIN_USERNAME)
    }

    /// Check a plaintext password against the stored bcrypt hash.
    ///
    /// Returns `Ok(false)` (not an error) if no admin account exists yet or
    /// the password does not match; bcrypt verification failures other than
    /// a mismatch are surfaced as [`MetadataError::InvalidArgument`].
    pub fn verify_admin_password(&self, plain: &str) -> Result<bool, MetadataError> {
        let Some(hash) = self.get_setting(SETTING_ADMIN_PASSWORD_BCRYPT)? else {
            return Ok(false);
        };
        bcrypt::verify(plain, &hash).map_err(|e| MetadataError::InvalidArgument(e.to_string()))
    }

    /// Set the admin username and password, bcrypt-hashing the password
    /// before it ever reaches disk.
    pub fn set_admin_password(&self, username: &str, plain: &str) -> Result<(), MetadataError> {
        let hash = bcrypt::hash(plain, BCRYPT_COST).map_err(|e| MetadataError::InvalidArgument(e.to_string()))?;
        self.set_setting(SETTING_ADMIN_USERNAME, username)?;
        self.set_setting(SETTING_ADMIN_PASSWORD_BCRYPT, &hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn new_store() -> MetadataStore {
        MetadataStore::open_with_read_pool_size(Path::new(":memory:"), 1).unwrap()
    }

    #[test]
    fn test_should_get_and_set_arbitrary_setting() {
        let store = new_store();
        assert_eq!(store.get_setting("server.region").unwrap(), None);
        store.set_setting("server.region", "us-east-1").unwrap();
        assert_eq!(store.get_setting("server.region").unwrap(), Some("us-east-1".to_owned()));
    }

    #[test]
    fn test_should_report_not_installed_by_default() {
        let store = new_store();
        assert!(!store.is_installed().unwrap());
    }

    #[test]
    fn test_should_mark_installed() {
        let store = new_store();
        store.set_installed().unwrap();
        assert!(store.is_installed().unwrap());
    }

    #[test]
    fn test_should_set_and_verify_admin_password() {
        let store = new_store();
        store.set_admin_password("admin", "hunter2").unwrap();
        assert!(store.verify_admin_password("hunter2").unwrap());
        assert!(!store.verify_admin_password("wrong").unwrap());
    }

    #[test]
    fn test_should_report_false_for_unset_admin_password() {
        let store = new_store();
        assert!(!store.verify_admin_password("anything").unwrap());
    }

    #[test]
    fn test_should_never_store_admin_password_in_plaintext() {
        let store = new_store();
        store.set_admin_password("admin", "hunter2").unwrap();
        let hash = store.get_setting(SETTING_ADMIN_PASSWORD_BCRYPT).unwrap().unwrap();
        assert_ne!(hash, "hunter2");
        assert!(hash.starts_with("$2"));
    }
}
