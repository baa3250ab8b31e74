//! Persistent SQLite database shared by the stats ledger and the member roster.

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::info;

/// Errors raised by the SQLite layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The database file could not be opened or its schema created.
    #[error("failed to open database '{}': {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    /// A single read or write failed at runtime.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// SQLite connection guarded by a mutex.
///
/// Every statement runs while holding the lock, so each transaction started
/// through [`Database::lock`] is serialized with respect to all others.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Create a new in-memory database.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(|e| StorageError::Open {
            path: PathBuf::from(":memory:"),
            source: e,
        })?;
        Self::with_connection(conn, Path::new(":memory:"))
    }

    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|e| StorageError::Open {
            path: path.to_path_buf(),
            source: e,
        })?;
        let db = Self::with_connection(conn, path)?;

        let (stats, members) = db.get_counts()?;
        info!("Loaded database from {:?} ({} counters, {} members)", path, stats, members);

        Ok(db)
    }

    fn with_connection(conn: Connection, path: &Path) -> Result<Self, StorageError> {
        init_schema(&conn).map_err(|e| StorageError::Open {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Lock the connection. A poisoned lock still holds a usable connection
    /// since SQLite rolls back any transaction left open by the panic.
    pub fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn get_counts(&self) -> Result<(usize, usize), StorageError> {
        let conn = self.lock();
        let stats: i64 = conn.query_row("SELECT COUNT(*) FROM stats", [], |row| row.get(0))?;
        let members: i64 = conn.query_row("SELECT COUNT(*) FROM members", [], |row| row.get(0))?;
        Ok((stats as usize, members as usize))
    }
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS stats (
            key TEXT PRIMARY KEY,
            count INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS members (
            chat_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            username TEXT NOT NULL,
            nickname TEXT,
            first_seen TEXT NOT NULL,
            last_seen TEXT,
            message_count INTEGER DEFAULT 0,
            status TEXT DEFAULT 'member',
            PRIMARY KEY (chat_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_members_status ON members(chat_id, status);
    "#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_created_in_memory() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.get_counts().unwrap(), (0, 0));
    }

    #[test]
    fn test_open_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.db");

        let db = Database::open(&path).unwrap();
        drop(db);
        assert!(path.exists());

        // Reopening an existing file keeps the schema intact
        let db = Database::open(&path).unwrap();
        assert_eq!(db.get_counts().unwrap(), (0, 0));
    }

    #[test]
    fn test_open_missing_directory_fails() {
        let err = match Database::open(Path::new("/nonexistent/dir/stats.db")) {
            Ok(_) => panic!("expected error, got Ok"),
            Err(e) => e,
        };
        assert!(matches!(err, StorageError::Open { .. }));
        assert!(err.to_string().contains("/nonexistent/dir/stats.db"));
    }
}
