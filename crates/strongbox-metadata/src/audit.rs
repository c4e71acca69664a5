//! Append-only audit log.
//!
//! Audit writes are best-effort from the caller's perspective (§7:
//! "failure to write audit does not fail the caller"), but this crate does
//! not itself swallow errors — the HTTP/admin layer decides whether to log
//! and continue or propagate.

use chrono::Utc;
use rusqlite::params;

use crate::error::MetadataError;
use crate::models::{AuditFilter, AuditLogRecord, AuditStats};
use crate::store::{MetadataStore, parse_timestamp};

impl MetadataStore {
    /// Append one audit log row.
    pub fn write_audit_log(&self, entry: &AuditLogRecord) -> Result<(), MetadataError> {
        let conn = self.write_pool.get()?;
        conn.execute(
            "INSERT INTO audit_log
                (timestamp, action, actor, ip, forwarded_ip, resource, detail, success, user_agent, location)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                entry.timestamp.to_rfc3339(),
                entry.action,
                entry.actor,
                entry.ip,
                entry.forwarded_ip,
                entry.resource,
                entry.detail,
                entry.success,
                entry.user_agent,
                entry.location,
            ],
        )?;
        Ok(())
    }

    /// Page through audit log rows matching `filter`, newest first.
    pub fn query_audit_logs(&self, filter: &AuditFilter, page: u32, limit: u32) -> Result<Vec<AuditLogRecord>, MetadataError> {
        let conn = self.read_pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT timestamp, action, actor, ip, forwarded_ip, resource, detail, success, user_agent, location
             FROM audit_log
             WHERE (?1 IS NULL OR actor = ?1)
               AND (?2 IS NULL OR action = ?2)
               AND (?3 IS NULL OR resource LIKE ?3 || '%')
               AND (?4 IS NULL OR timestamp >= ?4)
               AND (?5 IS NULL OR timestamp <= ?5)
             ORDER BY timestamp DESC
             LIMIT ?6 OFFSET ?7",
        )?;
        let rows = stmt.query_map(
            params![
                filter.actor,
                filter.action,
                filter.resource_prefix,
                filter.since.map(|d| d.to_rfc3339()),
                filter.until.map(|d| d.to_rfc3339()),
                limit,
                i64::from(page) * i64::from(limit),
            ],
            row_to_audit_log,
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(MetadataError::Connection)
    }

    /// Total/success/failure counts across every audit row.
    pub fn audit_stats(&self) -> Result<AuditStats, MetadataError> {
        let conn = self.read_pool.get()?;
        conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(success), 0) FROM audit_log",
            [],
            |row| {
                let total: i64 = row.get(0)?;
                let successes: i64 = row.get(1)?;
                Ok(AuditStats {
                    total: total as u64,
                    successes: successes as u64,
                    failures: (total - successes) as u64,
                })
            },
        )
        .map_err(MetadataError::Connection)
    }
}

fn row_to_audit_log(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditLogRecord> {
    let timestamp: String = row.get(0)?;
    Ok(AuditLogRecord {
        timestamp: parse_timestamp(&timestamp),
        action: row.get(1)?,
        actor: row.get(2)?,
        ip: row.get(3)?,
        forwarded_ip: row.get(4)?,
        resource: row.get(5)?,
        detail: row.get(6)?,
        success: row.get(7)?,
        user_agent: row.get(8)?,
        location: row.get(9)?,
    })
}

/// Helper constructing a minimal audit entry; callers fill in whatever
/// optional fields they have.
pub fn audit_entry(action: &str, actor: &str, ip: &str, resource: &str, success: bool) -> AuditLogRecord {
    AuditLogRecord {
        timestamp: Utc::now(),
        action: action.to_owned(),
        actor: actor.to_owned(),
        ip: ip.to_owned(),
        forwarded_ip: None,
        resource: resource.to_owned(),
        detail: None,
        success,
        user_agent: None,
        location: None,
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
    fn test_should_write_and_query_audit_log() {
        let store = new_store();
        store
            .write_audit_log(&audit_entry("PutObject", "AKID", "127.0.0.1", "b/k", true))
            .unwrap();

        let rows = store.query_audit_logs(&AuditFilter::default(), 0, 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].action, "PutObject");
    }

    #[test]
    fn test_should_filter_audit_logs_by_actor() {
        let store = new_store();
        store
            .write_audit_log(&audit_entry("PutObject", "AKID1", "127.0.0.1", "b/k", true))
            .unwrap();
        store
            .write_audit_log(&audit_entry("PutObject", "AKID2", "127.0.0.1", "b/k2", true))
            .unwrap();

        let filter = AuditFilter {
            actor: Some("AKID1".to_owned()),
            ..Default::default()
        };
        let rows = store.query_audit_logs(&filter, 0, 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].actor, "AKID1");
    }

    #[test]
    fn test_should_paginate_audit_logs() {
        let store = new_store();
        for i in 0..5 {
            store
                .write_audit_log(&audit_entry("PutObject", "AKID", "127.0.0.1", &format!("b/k{i}"), true))
                .unwrap();
        }
        let page0 = store.query_audit_logs(&AuditFilter::default(), 0, 2).unwrap();
        let page1 = store.query_audit_logs(&AuditFilter::default(), 1, 2).unwrap();
        assert_eq!(page0.len(), 2);
        assert_eq!(page1.len(), 2);
        assert_ne!(page0[0].resource, page1[0].resource);
    }

    #[test]
    fn test_should_compute_audit_stats() {
        let store = new_store();
        store
            .write_audit_log(&audit_entry("PutObject", "AKID", "127.0.0.1", "b/k", true))
            .unwrap();
        store
            .write_audit_log(&audit_entry("PutObject", "AKID", "127.0.0.1", "b/k2", false))
            .unwrap();

        let stats = store.audit_stats().unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.successes, 1);
        assert_eq!(stats.failures, 1);
    }
}
