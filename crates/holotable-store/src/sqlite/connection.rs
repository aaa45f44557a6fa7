//! `SQLite` connection pool.
//!
//! Uses `r2d2` connection pooling with the `r2d2_sqlite` backend. The
//! [`PragmaCustomizer`] runs on each new connection to set WAL mode and the
//! busy timeout.

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::errors::Result;

/// Alias for the connection pool type.
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// Alias for a pooled connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Configuration for the connection pool.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Maximum pool size (default: 8). In-memory pools always use 1.
    pub pool_size: u32,
    /// Busy timeout in milliseconds (default: 5000).
    pub busy_timeout_ms: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            pool_size: 8,
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug)]
struct PragmaCustomizer {
    busy_timeout_ms: u32,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for PragmaCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = WAL;\
             PRAGMA busy_timeout = {};\
             PRAGMA synchronous = NORMAL;",
            self.busy_timeout_ms
        ))?;
        Ok(())
    }
}

fn build(manager: SqliteConnectionManager, max_size: u32, config: &ConnectionConfig) -> Result<ConnectionPool> {
    let pool = Pool::builder()
        .max_size(max_size)
        .connection_timeout(Duration::from_secs(5))
        .connection_customizer(Box::new(PragmaCustomizer {
            busy_timeout_ms: config.busy_timeout_ms,
        }))
        .build(manager)?;
    Ok(pool)
}

/// Create an in-memory connection pool (for testing).
///
/// Every `SQLite` in-memory connection is its own database, so the pool holds
/// exactly one connection regardless of `config.pool_size`.
pub fn new_in_memory(config: &ConnectionConfig) -> Result<ConnectionPool> {
    build(SqliteConnectionManager::memory(), 1, config)
}

/// Create a file-backed connection pool.
pub fn new_file(path: &str, config: &ConnectionConfig) -> Result<ConnectionPool> {
    build(SqliteConnectionManager::file(path), config.pool_size.max(1), config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn journal_mode(conn: &Connection) -> String {
        conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn in_memory_pool_shares_one_database() {
        let pool = new_in_memory(&ConnectionConfig::default()).unwrap();
        assert_eq!(pool.max_size(), 1);
        {
            let conn = pool.get().unwrap();
            conn.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();
        }
        let conn = pool.get().unwrap();
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn file_pool_uses_wal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let pool = new_file(path.to_str().unwrap(), &ConnectionConfig::default()).unwrap();
        let conn = pool.get().unwrap();
        assert_eq!(journal_mode(&conn), "wal");
    }

    #[test]
    fn file_pool_respects_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sized.db");
        let config = ConnectionConfig {
            pool_size: 3,
            ..ConnectionConfig::default()
        };
        let pool = new_file(path.to_str().unwrap(), &config).unwrap();
        assert_eq!(pool.max_size(), 3);
    }
}
