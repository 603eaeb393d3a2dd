//! Per-operation outcomes of a sync pass.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::operation::{OperationType, PendingOperation};

/// Result of executing a single operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    /// Operation ID
    pub operation_id: String,
    /// Operation type
    pub operation_type: OperationType,
    /// Whether the remote accepted the mutation
    pub success: bool,
    /// Error message if failed
    pub error: Option<String>,
    /// When the attempt finished
    pub timestamp: DateTime<Utc>,
}

impl SyncResult {
    /// Successful attempt for `operation`.
    #[must_use]
    pub fn success(operation: &PendingOperation) -> Self {
        Self {
            operation_id: operation.id.clone(),
            operation_type: operation.operation_type(),
            success: true,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Failed attempt for `operation`.
    #[must_use]
    pub fn failure(operation: &PendingOperation, error: impl Into<String>) -> Self {
        Self {
            operation_id: operation.id.clone(),
            operation_type: operation.operation_type(),
            success: false,
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }
}

/// Aggregate counts for one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    /// Number of successful operations
    pub succeeded: usize,
    /// Number of failed operations
    pub failed: usize,
}

impl SyncSummary {
    #[must_use]
    pub fn from_results(results: &[SyncResult]) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            succeeded,
            failed: results.len() - succeeded,
        }
    }

    /// Check if all operations succeeded.
    #[must_use]
    pub const fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    /// Get total operations processed.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

impl std::fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} succeeded, {} failed", self.succeeded, self.failed)
    }
}
