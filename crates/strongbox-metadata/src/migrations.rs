//! Embedded, numbered schema migrations.
//!
//! Applied in order inside one transaction at startup against the write
//! connection; each applied version is recorded in `schema_migrations` so a
//! restart never re-applies a migration. A failing migration aborts the
//! transaction and the store refuses to open.

use rusqlite::{Connection, Transaction};

use crate::error::MetadataError;

struct Migration {
    version: i64,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: include_str!("migrations/0001_init.sql"),
    },
];

/// Apply every migration not yet recorded in `schema_migrations`.
pub fn run_migrations(conn: &mut Connection) -> Result<(), MetadataError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );",
    )?;

    let applied: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > applied) {
        let tx: Transaction = conn.transaction()?;
        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![migration.version, chrono::Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
        tracing::info!(version = migration.version, "applied schema migration");
    }

    Ok(())
}
