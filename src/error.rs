//! Error types for tether.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by the sync engine.
#[derive(Debug, Error)]
pub enum TetherError {
    /// Persistence layer failure (`SQLite` or another key/value backend).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration could not be read, parsed or validated.
    #[error("Config error: {0}")]
    Config(String),

    /// JSON or YAML (de)serialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// At-rest encode/decode failure.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Requested record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A queue mutation that would break an invariant.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Device is offline; returned by manual sync only.
    #[error("No network connection available")]
    NoConnection,

    /// A service was used before its dependencies were bound.
    #[error("Not initialized: {0}")]
    NotInitialized(String),

    /// The remote executor rejected or failed to apply a mutation.
    #[error("Remote error: {0}")]
    Remote(String),

    /// The remote executor did not answer in time.
    #[error("Execution timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Background task registration failed.
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// Filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for TetherError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<rusqlite::Error> for TetherError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl TetherError {
    /// Whether a sync pass should treat this failure as retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Remote(_) | Self::Timeout(_) | Self::NoConnection)
    }
}
