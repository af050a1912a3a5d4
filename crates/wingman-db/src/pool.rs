//! SQLite pool behind the server's blocking store calls.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use std::time::Duration;
use thiserror::Error;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Connection settings taken from the `[database]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// How long a writer waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
    pub pool_max_size: u32,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
        }
    }
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to open interview database: {0}")]
    Open(#[from] r2d2::Error),
}

/// Opens a pool over `db_path`.
///
/// A file database is switched to WAL so session writes do not block history
/// reads from other connections. `:memory:` gives every connection its own
/// database, so in-memory pools must have `pool_max_size: 1`.
pub fn create_pool(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    let manager = SqliteConnectionManager::file(db_path)
        .with_flags(
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )
        .with_init(move |conn| prepare_connection(conn, settings.busy_timeout_ms));

    Ok(Pool::builder()
        .max_size(settings.pool_max_size)
        .build(manager)?)
}

fn prepare_connection(conn: &mut Connection, busy_timeout_ms: u64) -> rusqlite::Result<()> {
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    if mode != "wal" && mode != "memory" {
        tracing::warn!(journal_mode = %mode, "database is not in WAL mode");
    }
    conn.busy_timeout(Duration::from_millis(busy_timeout_ms))
}
