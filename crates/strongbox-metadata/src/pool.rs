//! Connection pool setup: one dedicated write connection plus a pool of
//! read connections, both opened in WAL journal mode with a `busy_timeout`
//! so reader/writer contention backs off instead of erroring.

use std::path::Path;
use std::time::Duration;

use r2d2_sqlite::SqliteConnectionManager;

use crate::error::MetadataError;

pub type Pool = r2d2::Pool<SqliteConnectionManager>;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

fn manager(path: &Path) -> SqliteConnectionManager {
    SqliteConnectionManager::file(path).with_init(|conn| {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;",
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(())
    })
}

/// Build the single-connection write pool and the multi-connection read
/// pool for the database at `path`, creating the file if absent.
pub fn open_pools(path: &Path, max_read_connections: u32) -> Result<(Pool, Pool), MetadataError> {
    let write_pool = r2d2::Pool::builder()
        .max_size(1)
        .build(manager(path))
        .map_err(MetadataError::Pool)?;

    let read_pool = r2d2::Pool::builder()
        .max_size(max_read_connections)
        .build(manager(path))
        .map_err(MetadataError::Pool)?;

    Ok((write_pool, read_pool))
}
