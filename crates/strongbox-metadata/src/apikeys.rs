//! API keys and their bucket permissions.

use chrono::Utc;
use rand::Rng;
use rusqlite::{OptionalExtension, params};

use crate::error::MetadataError;
use crate::models::{ApiKeyRecord, NewApiKey, PermissionRecord};
use crate::store::{MetadataStore, parse_timestamp};

/// Length of a generated access key id, in characters.
const ACCESS_KEY_ID_LEN: usize = 20;
/// Length of a generated secret access key, in characters.
const SECRET_ACCESS_KEY_LEN: usize = 40;

fn random_hex_uppercase(len: usize) -> String {
    let mut rng = rand::rng();
    let mut buf = vec![0_u8; len.div_ceil(2)];
    rng.fill(buf.as_mut_slice());
    let hex = hex::encode(buf);
    hex[..len].to_uppercase()
}

fn random_hex(len: usize) -> String {
    let mut rng = rand::rng();
    let mut buf = vec![0_u8; len.div_ceil(2)];
    rng.fill(buf.as_mut_slice());
    hex::encode(buf)[..len].to_owned()
}

impl MetadataStore {
    /// Create a new api key with a freshly generated access key id and
    /// secret. The plaintext secret is returned only here; subsequent
    /// lookups never reveal it except through [`Self::get_api_key`], which
    /// internally needs it for signature verification.
    pub fn create_api_key(&self, description: &str) -> Result<NewApiKey, MetadataError> {
        let conn = self.write_pool.get()?;
        let access_key_id = random_hex_uppercase(ACCESS_KEY_ID_LEN);
        let secret_access_key = random_hex(SECRET_ACCESS_KEY_LEN);
        conn.execute(
            "INSERT INTO api_keys (access_key_id, secret_access_key, description, enabled, created_at)
             VALUES (?1, ?2, ?3, 1, ?4)",
            params![access_key_id, secret_access_key, description, Utc::now().to_rfc3339()],
        )?;
        Ok(NewApiKey {
            access_key_id,
            secret_access_key,
        })
    }

    /// Fetch a single api key row by access key id.
    pub fn get_api_key(&self, access_key_id: &str) -> Result<ApiKeyRecord, MetadataError> {
        let conn = self.read_pool.get()?;
        conn.query_row(
            "SELECT access_key_id, secret_access_key, description, enabled, created_at
             FROM api_keys WHERE access_key_id = ?1",
            params![access_key_id],
            row_to_api_key,
        )
        .optional()?
        .ok_or(MetadataError::NoSuchApiKey)
    }

    /// List every api key, ordered by creation time.
    pub fn list_api_keys(&self) -> Result<Vec<ApiKeyRecord>, MetadataError> {
        let conn = self.read_pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT access_key_id, secret_access_key, description, enabled, created_at
             FROM api_keys ORDER BY created_at",
        )?;
        let rows = stmt.query_map([], row_to_api_key)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(MetadataError::Connection)
    }

    /// Update an api key's description.
    pub fn update_api_key_description(&self, access_key_id: &str, description: &str) -> Result<(), MetadataError> {
        let conn = self.write_pool.get()?;
        let affected = conn.execute(
            "UPDATE api_keys SET description = ?2 WHERE access_key_id = ?1",
            params![access_key_id, description],
        )?;
        if affected == 0 {
            return Err(MetadataError::NoSuchApiKey);
        }
        Ok(())
    }

    /// Enable or disable an api key without touching its secret or permissions.
    pub fn update_api_key_enabled(&self, access_key_id: &str, enabled: bool) -> Result<(), MetadataError> {
        let conn = self.write_pool.get()?;
        let affected = conn.execute(
            "UPDATE api_keys SET enabled = ?2 WHERE access_key_id = ?1",
            params![access_key_id, enabled],
        )?;
        if affected == 0 {
            return Err(MetadataError::NoSuchApiKey);
        }
        Ok(())
    }

    /// Delete an api key and, via `ON DELETE CASCADE`, its permission rows.
    pub fn delete_api_key(&self, access_key_id: &str) -> Result<(), MetadataError> {
        let conn = self.write_pool.get()?;
        let affected = conn.execute("DELETE FROM api_keys WHERE access_key_id = ?1", params![access_key_id])?;
        if affected == 0 {
            return Err(MetadataError::NoSuchApiKey);
        }
        Ok(())
    }

    /// Replace an api key's secret with a freshly generated one, returning it.
    pub fn reset_api_key_secret(&self, access_key_id: &str) -> Result<String, MetadataError> {
        let conn = self.write_pool.get()?;
        let secret_access_key = random_hex(SECRET_ACCESS_KEY_LEN);
        let affected = conn.execute(
            "UPDATE api_keys SET secret_access_key = ?2 WHERE access_key_id = ?1",
            params![access_key_id, secret_access_key],
        )?;
        if affected == 0 {
            return Err(MetadataError::NoSuchApiKey);
        }
        Ok(secret_access_key)
    }

    /// Upsert a permission grant by `(access_key_id, bucket_name)`.
    pub fn set_permission(&self, permission: &PermissionRecord) -> Result<(), MetadataError> {
        let conn = self.write_pool.get()?;
        conn.execute(
            "INSERT INTO permissions (access_key_id, bucket_name, can_read, can_write)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (access_key_id, bucket_name) DO UPDATE SET
                can_read = excluded.can_read,
                can_write = excluded.can_write",
            params![
                permission.access_key_id,
                permission.bucket_name,
                permission.can_read,
                permission.can_write
            ],
        )?;
        Ok(())
    }

    /// Delete a single permission grant.
    pub fn delete_permission(&self, access_key_id: &str, bucket_name: &str) -> Result<(), MetadataError> {
        let conn = self.write_pool.get()?;
        conn.execute(
            "DELETE FROM permissions WHERE access_key_id = ?1 AND bucket_name = ?2",
            params![access_key_id, bucket_name],
        )?;
        Ok(())
    }

    /// List every permission grant held by an api key.
    pub fn list_permissions(&self, access_key_id: &str) -> Result<Vec<PermissionRecord>, MetadataError> {
        let conn = self.read_pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT access_key_id, bucket_name, can_read, can_write FROM permissions WHERE access_key_id = ?1",
        )?;
        let rows = stmt.query_map(params![access_key_id], row_to_permission)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(MetadataError::Connection)
    }

    /// Load every enabled and disabled api key together with its
    /// permissions, in the shape [`strongbox_auth::permission::ApiKeyCache::reload`]
    /// expects. Called at startup and after any api-key or permission mutation.
    pub fn load_all_api_keys_with_permissions(&self) -> Result<Vec<(ApiKeyRecord, Vec<PermissionRecord>)>, MetadataError> {
        let keys = self.list_api_keys()?;
        keys.into_iter()
            .map(|key| {
                let permissions = self.list_permissions(&key.access_key_id)?;
                Ok((key, permissions))
            })
            .collect()
    }
}

fn row_to_api_key(row: &rusqlite::Row<'_>) -> rusqlite::Result<ApiKeyRecord> {
    let created_at: String = row.get(4)?;
    Ok(ApiKeyRecord {
        access_key_id: row.get(0)?,
        secret_access_key: row.get(1)?,
        description: row.get(2)?,
        enabled: row.get(3)?,
        created_at: parse_timestamp(&created_at),
    })
}

fn row_to_permission(row: &rusqlite::Row<'_>) -> rusqlite::Result<PermissionRecord> {
    Ok(PermissionRecord {
        access_key_id: row.get(0)?,
        bucket_name: row.get(1)?,
        can_read: row.get(2)?,
        can_write: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn new_store() -> MetadataStore {
        MetadataStore::open_with_read_pool_size(Path::new(":memory:"), 1).unwrap()
    }

    #[test]
    fn test_should_create_api_key_with_expected_lengths() {
        let store = new_store();
        let key = store.create_api_key("ci pipeline").unwrap();
        assert_eq!(key.access_key_id.len(), ACCESS_KEY_ID_LEN);
        assert_eq!(key.secret_access_key.len(), SECRET_ACCESS_KEY_LEN);
    }

    #[test]
    fn test_should_get_created_api_key() {
        let store = new_store();
        let key = store.create_api_key("ci pipeline").unwrap();
        let record = store.get_api_key(&key.access_key_id).unwrap();
        assert_eq!(record.secret_access_key, key.secret_access_key);
        assert!(record.enabled);
    }

    #[test]
    fn test_should_disable_and_reenable_key() {
        let store = new_store();
        let key = store.create_api_key("ci").unwrap();
        store.update_api_key_enabled(&key.access_key_id, false).unwrap();
        assert!(!store.get_api_key(&key.access_key_id).unwrap().enabled);
    }

    #[test]
    fn test_should_reset_secret_and_change_value() {
        let store = new_store();
        let key = store.create_api_key("ci").unwrap();
        let new_secret = store.reset_api_key_secret(&key.access_key_id).unwrap();
        assert_ne!(new_secret, key.secret_access_key);
        assert_eq!(store.get_api_key(&key.access_key_id).unwrap().secret_access_key, new_secret);
    }

    #[test]
    fn test_should_delete_key_and_cascade_permissions() {
        let store = new_store();
        let key = store.create_api_key("ci").unwrap();
        store
            .set_permission(&PermissionRecord {
                access_key_id: key.access_key_id.clone(),
                bucket_name: "*".to_owned(),
                can_read: true,
                can_write: true,
            })
            .unwrap();

        store.delete_api_key(&key.access_key_id).unwrap();
        assert!(store.list_permissions(&key.access_key_id).unwrap().is_empty());
    }

    #[test]
    fn test_should_upsert_permission_on_conflict() {
        let store = new_store();
        let key = store.create_api_key("ci").unwrap();
        let mut permission = PermissionRecord {
            access_key_id: key.access_key_id.clone(),
            bucket_name: "b".to_owned(),
            can_read: true,
            can_write: false,
        };
        store.set_permission(&permission).unwrap();
        permission.can_write = true;
        store.set_permission(&permission).unwrap();

        let loaded = store.list_permissions(&key.access_key_id).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded[0].can_write);
    }
}
