//! Multipart upload sessions and parts.

use chrono::Utc;
use rusqlite::{OptionalExtension, params};

use crate::error::MetadataError;
use crate::models::{PartRecord, UploadSessionRecord};
use crate::store::{MetadataStore, parse_timestamp};

impl MetadataStore {
    /// Create a new upload session with a fresh `upload_id`.
    pub fn create_upload(&self, bucket: &str, key: &str, content_type: &str) -> Result<UploadSessionRecord, MetadataError> {
        let conn = self.write_pool.get()?;
        let upload_id = uuid::Uuid::new_v4().to_string();
        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO upload_sessions (upload_id, bucket, key, content_type, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![upload_id, bucket, key, content_type, created_at.to_rfc3339()],
        )?;
        Ok(UploadSessionRecord {
            upload_id,
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            content_type: content_type.to_owned(),
            created_at,
        })
    }

    /// Fetch an upload session by id.
    pub fn get_upload(&self, upload_id: &str) -> Result<UploadSessionRecord, MetadataError> {
        let conn = self.read_pool.get()?;
        conn.query_row(
            "SELECT upload_id, bucket, key, content_type, created_at FROM upload_sessions WHERE upload_id = ?1",
            params![upload_id],
            row_to_session,
        )
        .optional()?
        .ok_or(MetadataError::NoSuchUpload)
    }

    /// List every upload session older than `older_than`, used by garbage
    /// collection to find abandoned multipart uploads.
    pub fn list_stale_uploads(&self, older_than: chrono::DateTime<Utc>) -> Result<Vec<UploadSessionRecord>, MetadataError> {
        let conn = self.read_pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT upload_id, bucket, key, content_type, created_at FROM upload_sessions WHERE created_at < ?1",
        )?;
        let rows = stmt.query_map(params![older_than.to_rfc3339()], row_to_session)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(MetadataError::Connection)
    }

    /// Delete an upload session and, via `ON DELETE CASCADE`, every part row
    /// that belonged to it. Idempotent: deleting an already-gone session is
    /// not an error.
    pub fn delete_upload(&self, upload_id: &str) -> Result<(), MetadataError> {
        let conn = self.write_pool.get()?;
        conn.execute("DELETE FROM upload_sessions WHERE upload_id = ?1", params![upload_id])?;
        Ok(())
    }

    /// Insert or replace a part row by `(upload_id, part_number)`.
    pub fn put_part(&self, part: &PartRecord) -> Result<(), MetadataError> {
        let conn = self.write_pool.get()?;
        let exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM upload_sessions WHERE upload_id = ?1",
            params![part.upload_id],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(MetadataError::NoSuchUpload);
        }
        conn.execute(
            "INSERT INTO parts (upload_id, part_number, etag, size, storage_path)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (upload_id, part_number) DO UPDATE SET
                etag = excluded.etag,
                size = excluded.size,
                storage_path = excluded.storage_path",
            params![part.upload_id, part.part_number, part.etag, part.size as i64, part.storage_path],
        )?;
        Ok(())
    }

    /// Fetch a single part.
    pub fn get_part(&self, upload_id: &str, part_number: i64) -> Result<PartRecord, MetadataError> {
        let conn = self.read_pool.get()?;
        conn.query_row(
            "SELECT upload_id, part_number, etag, size, storage_path FROM parts
             WHERE upload_id = ?1 AND part_number = ?2",
            params![upload_id, part_number],
            row_to_part,
        )
        .optional()?
        .ok_or(MetadataError::InvalidPart(format!("no such part {part_number}")))
    }

    /// List every part of an upload, ordered by part number.
    pub fn list_parts(&self, upload_id: &str) -> Result<Vec<PartRecord>, MetadataError> {
        let conn = self.read_pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT upload_id, part_number, etag, size, storage_path FROM parts
             WHERE upload_id = ?1 ORDER BY part_number",
        )?;
        let rows = stmt.query_map(params![upload_id], row_to_part)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(MetadataError::Connection)
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<UploadSessionRecord> {
    let created_at: String = row.get(4)?;
    Ok(UploadSessionRecord {
        upload_id: row.get(0)?,
        bucket: row.get(1)?,
        key: row.get(2)?,
        content_type: row.get(3)?,
        created_at: parse_timestamp(&created_at),
    })
}

fn row_to_part(row: &rusqlite::Row<'_>) -> rusqlite::Result<PartRecord> {
    let size: i64 = row.get(3)?;
    Ok(PartRecord {
        upload_id: row.get(0)?,
        part_number: row.get(1)?,
        etag: row.get(2)?,
        size: size as u64,
        storage_path: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn new_store() -> MetadataStore {
        let store = MetadataStore::open_with_read_pool_size(Path::new(":memory:"), 1).unwrap();
        store.create_bucket("b").unwrap();
        store
    }

    fn sample_part(upload_id: &str, part_number: i64) -> PartRecord {
        PartRecord {
            upload_id: upload_id.to_owned(),
            part_number,
            etag: "\"etag\"".to_owned(),
            size: 5 * 1024 * 1024,
            storage_path: format!(".multipart/{upload_id}/{part_number}"),
        }
    }

    #[test]
    fn test_should_create_and_get_upload_session() {
        let store = new_store();
        let session = store.create_upload("b", "big.bin", "application/octet-stream").unwrap();
        let fetched = store.get_upload(&session.upload_id).unwrap();
        assert_eq!(fetched.key, "big.bin");
    }

    #[test]
    fn test_should_reject_part_for_unknown_upload() {
        let store = new_store();
        assert!(matches!(
            store.put_part(&sample_part("missing", 1)),
            Err(MetadataError::NoSuchUpload)
        ));
    }

    #[test]
    fn test_should_put_and_list_parts_in_order() {
        let store = new_store();
        let session = store.create_upload("b", "big.bin", "application/octet-stream").unwrap();
        store.put_part(&sample_part(&session.upload_id, 2)).unwrap();
        store.put_part(&sample_part(&session.upload_id, 1)).unwrap();

        let parts = store.list_parts(&session.upload_id).unwrap();
        assert_eq!(parts.iter().map(|p| p.part_number).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_should_cascade_delete_parts_with_session() {
        let store = new_store();
        let session = store.create_upload("b", "big.bin", "application/octet-stream").unwrap();
        store.put_part(&sample_part(&session.upload_id, 1)).unwrap();

        store.delete_upload(&session.upload_id).unwrap();
        assert!(store.list_parts(&session.upload_id).unwrap().is_empty());
    }

    #[test]
    fn test_should_delete_upload_idempotently() {
        let store = new_store();
        let session = store.create_upload("b", "big.bin", "application/octet-stream").unwrap();
        store.delete_upload(&session.upload_id).unwrap();
        store.delete_upload(&session.upload_id).unwrap();
    }
}
