//! Raw key/value backends.
//!
//! A backend stores strings under string keys and knows nothing about
//! sensitivity or encoding; [`SecureStore`](super::SecureStore) layers that
//! on top.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use super::Database;
use crate::error::TetherError;

/// Persisted string key/value storage.
#[cfg_attr(test, mockall::automock)]
pub trait KeyValueBackend: Send + Sync {
    /// Read a value. `Ok(None)` means the key is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, TetherError>;

    /// Insert or replace a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), TetherError>;

    /// Delete a value. Deleting an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), TetherError>;

    /// List stored keys in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn keys(&self) -> Result<Vec<String>, TetherError>;
}

/// Backend over the `kv_store` table.
pub struct SqliteBackend {
    db: Database,
}

impl SqliteBackend {
    /// Open the backend at the default database location.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open() -> Result<Self, TetherError> {
        Ok(Self::with_database(Database::open()?))
    }

    /// Create a backend with an existing database connection.
    #[must_use]
    pub const fn with_database(db: Database) -> Self {
        Self { db }
    }
}

impl KeyValueBackend for SqliteBackend {
    fn get(&self, key: &str) -> Result<Option<String>, TetherError> {
        self.db
            .with_connection(|conn| {
                conn.query_row("SELECT value FROM kv_store WHERE key = ?1", [key], |row| {
                    row.get(0)
                })
                .optional()
            })
            .map_err(|e| TetherError::Storage(format!("Failed to read key {key}: {e}")))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), TetherError> {
        self.db
            .with_connection(|conn| {
                conn.execute(
                    r"INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
                      ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                    params![key, value, Utc::now().to_rfc3339()],
                )
            })
            .map(|_| ())
            .map_err(|e| TetherError::Storage(format!("Failed to write key {key}: {e}")))
    }

    fn remove(&self, key: &str) -> Result<(), TetherError> {
        self.db
            .with_connection(|conn| conn.execute("DELETE FROM kv_store WHERE key = ?1", [key]))
            .map(|_| ())
            .map_err(|e| TetherError::Storage(format!("Failed to delete key {key}: {e}")))
    }

    fn keys(&self) -> Result<Vec<String>, TetherError> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT key FROM kv_store ORDER BY key ASC")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect()
        })
    }
}

/// Volatile backend for tests and hosts without a writable filesystem.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw value as stored, bypassing any decoding.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, TetherError> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), TetherError> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), TetherError> {
        self.lock().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, TetherError> {
        Ok(self.lock().keys().cloned().collect())
    }
}
