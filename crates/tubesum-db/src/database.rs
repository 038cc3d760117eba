//! Connection pool for the job database.

use crate::error::{DbError, DbResult};
use crate::migrations;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;
use tracing::{debug, info};

pub type ConnectionPool = Pool<SqliteConnectionManager>;
pub type PooledConn = PooledConnection<SqliteConnectionManager>;

/// Connections per file-backed pool. Pipeline runs and the CLI share it.
const FILE_POOL_SIZE: u32 = 8;

/// Handle to the SQLite job database. Clones share one pool.
#[derive(Clone)]
pub struct Database {
    pool: ConnectionPool,
}

impl Database {
    /// Open (creating if needed) the database file and bring its schema up to date.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DbError::Other(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        info!("Opening job database {}", path.display());

        // Concurrent job updates block on the write lock instead of failing with SQLITE_BUSY.
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA busy_timeout = 5000;",
            )
        });

        Self::from_manager(manager, FILE_POOL_SIZE)
    }

    /// A private in-memory database. Every connection to `:memory:` is a
    /// separate database, so the pool holds exactly one.
    pub fn open_in_memory() -> DbResult<Self> {
        Self::from_manager(SqliteConnectionManager::memory(), 1)
    }

    fn from_manager(manager: SqliteConnectionManager, max_size: u32) -> DbResult<Self> {
        let pool = Pool::builder().max_size(max_size).build(manager)?;
        migrations::initialize_schema(&*pool.get()?)?;
        debug!("Job database ready (pool size {})", max_size);
        Ok(Self { pool })
    }

    /// Borrow a pooled connection.
    pub fn conn(&self) -> DbResult<PooledConn> {
        Ok(self.pool.get()?)
    }

    /// `PRAGMA integrity_check` reports "ok".
    pub fn integrity_check(&self) -> DbResult<bool> {
        let verdict: String =
            self.conn()?
                .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(verdict == "ok")
    }

    /// Schema version stored in the file.
    pub fn schema_version(&self) -> DbResult<i32> {
        migrations::schema_version(&*self.conn()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_has_current_schema() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.schema_version().unwrap(), migrations::SCHEMA_VERSION);
        assert!(db.integrity_check().unwrap());
    }

    #[test]
    fn test_open_file_creates_parent_and_reopens() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("nested").join("tubesum.db");

        let db = Database::open(&path).unwrap();
        assert!(path.exists());
        drop(db);

        let reopened = Database::open(&path).unwrap();
        assert_eq!(
            reopened.schema_version().unwrap(),
            migrations::SCHEMA_VERSION
        );
    }
}
