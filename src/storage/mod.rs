//! Storage layer for tether.
//!
//! - `SQLite` database with schema migrations
//! - Raw key/value backends (`SQLite`, in-memory)
//! - [`SecureStore`], the key/value API the rest of the engine uses

mod backend;
mod cipher;
mod database;
mod migrations;
mod secure;

pub use backend::{KeyValueBackend, MemoryBackend, SqliteBackend};
#[cfg(test)]
pub use backend::MockKeyValueBackend;
pub use cipher::{ObfuscationCipher, ValueCipher};
pub use database::Database;
pub use secure::{SecureStore, SECURE_KEY_PREFIX};
