//! The metadata store: buckets and objects.
//!
//! Multipart, api-key/permission, settings/admin, and audit operations live
//! in their own `impl MetadataStore` blocks in sibling modules; this file
//! owns construction, the connection pools, and the two busiest tables.

use std::path::Path;

use chrono::Utc;
use rusqlite::{OptionalExtension, params};

use crate::error::MetadataError;
use crate::migrations::run_migrations;
use crate::models::{BucketRecord, ObjectListPage, ObjectRecord};
use crate::pool::{Pool, open_pools};

/// Durable, transactional record of every bucket, object, upload session,
/// part, api-key, permission, setting, and audit log row.
///
/// All writes are serialized through a single dedicated connection (the
/// write pool has exactly one slot, so a second writer simply blocks until
/// the first's transaction commits); reads run against a separate pool and
/// never wait on a writer.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    pub(crate) write_pool: Pool,
    pub(crate) read_pool: Pool,
}

impl MetadataStore {
    /// Open (creating if absent) the database at `path`, running any
    /// pending migrations before returning.
    pub fn open(path: &Path) -> Result<Self, MetadataError> {
        Self::open_with_read_pool_size(path, 4)
    }

    /// Like [`Self::open`], but with an explicit read-pool size. Exposed for
    /// tests that want a single in-memory connection per pool.
    pub fn open_with_read_pool_size(path: &Path, max_read_connections: u32) -> Result<Self, MetadataError> {
        let (write_pool, read_pool) = open_pools(path, max_read_connections)?;
        {
            let mut conn = write_pool.get()?;
            run_migrations(&mut conn)?;
        }
        Ok(Self { write_pool, read_pool })
    }

    // -- Buckets ------------------------------------------------------

    /// Create a bucket row. Fails with [`MetadataError::BucketAlreadyExists`]
    /// if the name is already taken.
    pub fn create_bucket(&self, name: &str) -> Result<BucketRecord, MetadataError> {
        let conn = self.write_pool.get()?;
        let created_at = Utc::now();
        let result = conn.execute(
            "INSERT INTO buckets (name, created_at, is_public) VALUES (?1, ?2, 0)",
            params![name, created_at.to_rfc3339()],
        );
        match result {
            Ok(_) => Ok(BucketRecord {
                name: name.to_owned(),
                created_at,
                is_public: false,
            }),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
                Err(MetadataError::BucketAlreadyExists)
            }
            Err(e) => Err(MetadataError::Connection(e)),
        }
    }

    /// Fetch a bucket by name.
    pub fn get_bucket(&self, name: &str) -> Result<BucketRecord, MetadataError> {
        let conn = self.read_pool.get()?;
        conn.query_row(
            "SELECT name, created_at, is_public FROM buckets WHERE name = ?1",
            params![name],
            row_to_bucket,
        )
        .optional()?
        .ok_or(MetadataError::NoSuchBucket)
    }

    /// List every bucket, ordered by name.
    pub fn list_buckets(&self) -> Result<Vec<BucketRecord>, MetadataError> {
        let conn = self.read_pool.get()?;
        let mut stmt = conn.prepare("SELECT name, created_at, is_public FROM buckets ORDER BY name")?;
        let rows = stmt.query_map([], row_to_bucket)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(MetadataError::Connection)
    }

    /// Delete a bucket. Fails with [`MetadataError::BucketNotEmpty`] if any
    /// object row still references it.
    pub fn delete_bucket(&self, name: &str) -> Result<(), MetadataError> {
        let conn = self.write_pool.get()?;
        let object_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM objects WHERE bucket = ?1",
            params![name],
            |row| row.get(0),
        )?;
        if object_count > 0 {
            return Err(MetadataError::BucketNotEmpty);
        }
        let affected = conn.execute("DELETE FROM buckets WHERE name = ?1", params![name])?;
        if affected == 0 {
            return Err(MetadataError::NoSuchBucket);
        }
        Ok(())
    }

    /// Flip a bucket's `is_public` flag.
    pub fn update_bucket_is_public(&self, name: &str, is_public: bool) -> Result<(), MetadataError> {
        let conn = self.write_pool.get()?;
        let affected = conn.execute(
            "UPDATE buckets SET is_public = ?2 WHERE name = ?1",
            params![name, is_public],
        )?;
        if affected == 0 {
            return Err(MetadataError::NoSuchBucket);
        }
        Ok(())
    }

    // -- Objects ------------------------------------------------------

    /// Insert or replace an object row by `(bucket, key)`.
    pub fn put_object(&self, object: &ObjectRecord) -> Result<(), MetadataError> {
        let conn = self.write_pool.get()?;
        conn.execute(
            "INSERT INTO objects (bucket, key, size, etag, content_type, storage_path, last_modified)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (bucket, key) DO UPDATE SET
                size = excluded.size,
                etag = excluded.etag,
                content_type = excluded.content_type,
                storage_path = excluded.storage_path,
                last_modified = excluded.last_modified",
            params![
                object.bucket,
                object.key,
                object.size as i64,
                object.etag,
                object.content_type,
                object.storage_path,
                object.last_modified.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Fetch an object by `(bucket, key)`.
    pub fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectRecord, MetadataError> {
        let conn = self.read_pool.get()?;
        conn.query_row(
            "SELECT bucket, key, size, etag, content_type, storage_path, last_modified
             FROM objects WHERE bucket = ?1 AND key = ?2",
            params![bucket, key],
            row_to_object,
        )
        .optional()?
        .ok_or(MetadataError::NoSuchKey)
    }

    /// Delete an object row. Returns the deleted row so the caller can
    /// remove its backing file after the transaction commits.
    pub fn delete_object(&self, bucket: &str, key: &str) -> Result<ObjectRecord, MetadataError> {
        let conn = self.write_pool.get()?;
        let record = conn
            .query_row(
                "SELECT bucket, key, size, etag, content_type, storage_path, last_modified
                 FROM objects WHERE bucket = ?1 AND key = ?2",
                params![bucket, key],
                row_to_object,
            )
            .optional()?
            .ok_or(MetadataError::NoSuchKey)?;
        conn.execute(
            "DELETE FROM objects WHERE bucket = ?1 AND key = ?2",
            params![bucket, key],
        )?;
        Ok(record)
    }

    /// List objects under `prefix`, grouping by `delimiter` into
    /// `common_prefixes`, paginated by `marker` (the last key already
    /// returned) and bounded to `max_keys` rows.
    pub fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        marker: Option<&str>,
        max_keys: u32,
    ) -> Result<ObjectListPage, MetadataError> {
        let conn = self.read_pool.get()?;
        let marker = marker.unwrap_or("");
        let mut stmt = conn.prepare(
            "SELECT bucket, key, size, etag, content_type, storage_path, last_modified
             FROM objects
             WHERE bucket = ?1 AND key LIKE ?2 ESCAPE '\\' AND key > ?3
             ORDER BY key",
        )?;
        let like_prefix = format!("{}%", escape_like(prefix));
        let rows = stmt.query_map(params![bucket, like_prefix, marker], row_to_object)?;

        let mut contents = Vec::new();
        let mut common_prefixes = std::collections::BTreeSet::new();
        let mut is_truncated = false;
        let mut next_marker = None;

        for row in rows {
            let object = row?;
            if let Some(delim) = delimiter {
                let rest = &object.key[prefix.len()..];
                if let Some(pos) = rest.find(delim) {
                    let grouped = format!("{prefix}{}", &rest[..pos + delim.len()]);
                    common_prefixes.insert(grouped);
                    continue;
                }
            }
            if (contents.len() + common_prefixes.len()) as u32 >= max_keys {
                is_truncated = true;
                break;
            }
            next_marker = Some(object.key.clone());
            contents.push(object);
        }

        Ok(ObjectListPage {
            contents,
            common_prefixes: common_prefixes.into_iter().collect(),
            is_truncated,
            next_marker: if is_truncated { next_marker } else { None },
        })
    }

    /// Fetch the `limit` most recently modified objects across all buckets,
    /// used by the admin dashboard.
    pub fn get_recent_objects(&self, limit: u32) -> Result<Vec<ObjectRecord>, MetadataError> {
        let conn = self.read_pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT bucket, key, size, etag, content_type, storage_path, last_modified
             FROM objects ORDER BY last_modified DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], row_to_object)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(MetadataError::Connection)
    }
}

fn escape_like(input: &str) -> String {
    input.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn row_to_bucket(row: &rusqlite::Row<'_>) -> rusqlite::Result<BucketRecord> {
    let created_at: String = row.get(1)?;
    Ok(BucketRecord {
        name: row.get(0)?,
        created_at: parse_timestamp(&created_at),
        is_public: row.get(2)?,
    })
}

fn row_to_object(row: &rusqlite::Row<'_>) -> rusqlite::Result<ObjectRecord> {
    let size: i64 = row.get(2)?;
    let last_modified: String = row.get(6)?;
    Ok(ObjectRecord {
        bucket: row.get(0)?,
        key: row.get(1)?,
        size: size as u64,
        etag: row.get(3)?,
        content_type: row.get(4)?,
        storage_path: row.get(5)?,
        last_modified: parse_timestamp(&last_modified),
    })
}

pub(crate) fn parse_timestamp(value: &str) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_store() -> MetadataStore {
        MetadataStore::open_with_read_pool_size(Path::new(":memory:"), 1).unwrap()
    }

    fn sample_object(bucket: &str, key: &str) -> ObjectRecord {
        ObjectRecord {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            size: 5,
            etag: "\"abc\"".to_owned(),
            content_type: "text/plain".to_owned(),
            storage_path: "aa/bb/enc".to_owned(),
            last_modified: Utc::now(),
        }
    }

    #[test]
    fn test_should_create_and_get_bucket() {
        let store = new_store();
        store.create_bucket("my-bucket").unwrap();
        let bucket = store.get_bucket("my-bucket").unwrap();
        assert_eq!(bucket.name, "my-bucket");
        assert!(!bucket.is_public);
    }

    #[test]
    fn test_should_reject_duplicate_bucket() {
        let store = new_store();
        store.create_bucket("my-bucket").unwrap();
        assert!(matches!(
            store.create_bucket("my-bucket"),
            Err(MetadataError::BucketAlreadyExists)
        ));
    }

    #[test]
    fn test_should_reject_deleting_nonempty_bucket() {
        let store = new_store();
        store.create_bucket("my-bucket").unwrap();
        store.put_object(&sample_object("my-bucket", "k")).unwrap();
        assert!(matches!(
            store.delete_bucket("my-bucket"),
            Err(MetadataError::BucketNotEmpty)
        ));
    }

    #[test]
    fn test_should_delete_empty_bucket() {
        let store = new_store();
        store.create_bucket("my-bucket").unwrap();
        store.delete_bucket("my-bucket").unwrap();
        assert!(matches!(store.get_bucket("my-bucket"), Err(MetadataError::NoSuchBucket)));
    }

    #[test]
    fn test_should_put_and_get_object() {
        let store = new_store();
        store.create_bucket("my-bucket").unwrap();
        store.put_object(&sample_object("my-bucket", "k")).unwrap();
        let object = store.get_object("my-bucket", "k").unwrap();
        assert_eq!(object.size, 5);
    }

    #[test]
    fn test_should_overwrite_object_on_put() {
        let store = new_store();
        store.create_bucket("my-bucket").unwrap();
        store.put_object(&sample_object("my-bucket", "k")).unwrap();
        let mut updated = sample_object("my-bucket", "k");
        updated.size = 9;
        store.put_object(&updated).unwrap();

        let object = store.get_object("my-bucket", "k").unwrap();
        assert_eq!(object.size, 9);
    }

    #[test]
    fn test_should_delete_object_and_return_it() {
        let store = new_store();
        store.create_bucket("my-bucket").unwrap();
        store.put_object(&sample_object("my-bucket", "k")).unwrap();
        let deleted = store.delete_object("my-bucket", "k").unwrap();
        assert_eq!(deleted.key, "k");
        assert!(matches!(
            store.get_object("my-bucket", "k"),
            Err(MetadataError::NoSuchKey)
        ));
    }

    #[test]
    fn test_should_list_objects_with_prefix_and_delimiter() {
        let store = new_store();
        store.create_bucket("my-bucket").unwrap();
        for key in ["photos/a.jpg", "photos/b.jpg", "photos/2024/c.jpg", "notes.txt"] {
            store.put_object(&sample_object("my-bucket", key)).unwrap();
        }

        let page = store
            .list_objects("my-bucket", "photos/", Some("/"), None, 100)
            .unwrap();
        assert_eq!(page.contents.len(), 2);
        assert_eq!(page.common_prefixes, vec!["photos/2024/".to_owned()]);
        assert!(!page.is_truncated);
    }

    #[test]
    fn test_should_paginate_object_listing() {
        let store = new_store();
        store.create_bucket("my-bucket").unwrap();
        for key in ["a", "b", "c", "d"] {
            store.put_object(&sample_object("my-bucket", key)).unwrap();
        }

        let page1 = store.list_objects("my-bucket", "", None, None, 2).unwrap();
        assert_eq!(page1.contents.len(), 2);
        assert!(page1.is_truncated);

        let page2 = store
            .list_objects("my-bucket", "", None, page1.next_marker.as_deref(), 2)
            .unwrap();
        assert_eq!(page2.contents.len(), 2);
        assert!(!page2.is_truncated);
    }
}
