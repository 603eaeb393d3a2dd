//! `SQLite` database connection and operations.
//!
//! The database is stored at `~/.tether/tether.db` and contains the
//! `kv_store` table that backs the secure key/value store (and through it the
//! operation queue and the last sync timestamp).

use std::sync::{Mutex, PoisonError};

use rusqlite::Connection;

use crate::config::Paths;
use crate::error::TetherError;

use super::migrations;

/// Database connection wrapper.
///
/// The connection sits behind a mutex so the database can be shared between
/// the queue and the orchestrator across await points.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at the default location.
    ///
    /// Creates the database file and runs migrations if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub fn open() -> Result<Self, TetherError> {
        let paths = Paths::new()?;
        paths.ensure_dirs()?;
        Self::open_at(&paths.database)
    }

    /// Open the database at a specific path.
    ///
    /// Creates the database file and runs migrations if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub fn open_at(path: &std::path::Path) -> Result<Self, TetherError> {
        let conn = Connection::open(path).map_err(|e| {
            TetherError::Storage(format!("Failed to open database {}: {e}", path.display()))
        })?;

        Self::from_connection(conn)
    }

    /// Open an in-memory database (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub fn open_in_memory() -> Result<Self, TetherError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            TetherError::Storage(format!("Failed to open in-memory database: {e}"))
        })?;

        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, TetherError> {
        migrations::run(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Get the current schema version.
    ///
    /// # Errors
    ///
    /// Returns an error if the version cannot be read.
    pub fn schema_version(&self) -> Result<i32, TetherError> {
        let conn = self.lock();
        migrations::get_version(&conn)
    }

    /// Run a closure against the underlying connection.
    ///
    /// # Errors
    ///
    /// Returns `TetherError::Storage` if the closure fails.
    pub fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    ) -> Result<T, TetherError> {
        let conn = self.lock();
        f(&conn).map_err(|e| TetherError::Storage(format!("Query failed: {e}")))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
