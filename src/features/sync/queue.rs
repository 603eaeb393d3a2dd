//! Durable, priority-ordered queue of pending operations.
//!
//! The whole queue is one JSON array under [`QUEUE_KEY`] in the
//! [`SecureStore`]. Every mutation is a full read-modify-write of that
//! array, serialized by an in-process lock; concurrent writers from other
//! processes are not supported.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::operation::{OperationPayload, OperationUpdate, PendingOperation};
use crate::config::{Config, Feature};
use crate::error::TetherError;
use crate::storage::SecureStore;

/// Storage key holding the serialized queue.
pub const QUEUE_KEY: &str = "pending_operations";

/// Sync queue for managing offline operations.
pub struct OperationQueue {
    store: Arc<SecureStore>,
    config: Arc<Config>,
    write_lock: Mutex<()>,
}

impl OperationQueue {
    /// Create a queue over an existing store.
    #[must_use]
    pub fn new(store: Arc<SecureStore>, config: Arc<Config>) -> Self {
        Self {
            store,
            config,
            write_lock: Mutex::new(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Strict read used by every mutation; a failed read must never be
    /// mistaken for an empty queue.
    fn load(&self) -> Result<Vec<PendingOperation>, TetherError> {
        Ok(self.store.read_object(QUEUE_KEY)?.unwrap_or_default())
    }

    fn save(&self, operations: &[PendingOperation]) -> Result<(), TetherError> {
        self.store.set_object(QUEUE_KEY, operations)
    }

    /// Add an operation to the queue.
    ///
    /// The priority is derived from the operation type and never changes
    /// afterwards.
    ///
    /// # Errors
    ///
    /// Returns `TetherError::InvalidOperation` when offline mode is disabled,
    /// or an error if the queue cannot be read or written.
    pub fn enqueue(&self, payload: OperationPayload) -> Result<PendingOperation, TetherError> {
        if !self.config.is_enabled(Feature::OfflineMode) {
            return Err(TetherError::InvalidOperation(format!(
                "Offline mode is disabled, {} was not queued",
                payload.operation_type().as_str()
            )));
        }

        let level = payload.operation_type().priority_level();
        let operation = PendingOperation::new(payload, self.config.priority_weight(level));

        let _guard = self.lock();
        let mut operations = self.load()?;
        operations.push(operation.clone());
        self.save(&operations)?;

        info!(
            id = %operation.id,
            operation_type = operation.operation_type().as_str(),
            priority = operation.priority,
            "Queued operation"
        );
        Ok(operation)
    }

    /// All queued operations in insertion order.
    ///
    /// An unreadable queue reads as empty.
    #[must_use]
    pub fn list(&self) -> Vec<PendingOperation> {
        self.store.get_object(QUEUE_KEY).unwrap_or_default()
    }

    /// All queued operations in execution order: highest priority first,
    /// oldest first within a priority.
    #[must_use]
    pub fn list_sorted(&self) -> Vec<PendingOperation> {
        let mut operations = self.list();
        // sort_by is stable, so equal timestamps keep their enqueue order
        operations.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.timestamp.cmp(&b.timestamp))
        });
        operations
    }

    /// Get a specific operation by ID.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<PendingOperation> {
        self.list().into_iter().find(|op| op.id == id)
    }

    /// Remove an operation. Removing an absent id is a no-op.
    ///
    /// Returns whether an operation was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read or written.
    pub fn remove(&self, id: &str) -> Result<bool, TetherError> {
        let _guard = self.lock();
        let mut operations = self.load()?;
        let before = operations.len();
        operations.retain(|op| op.id != id);

        if operations.len() == before {
            debug!(id, "Remove of absent operation ignored");
            return Ok(false);
        }

        self.save(&operations)?;
        Ok(true)
    }

    /// Merge a partial update into an operation.
    ///
    /// Returns `false` (and logs a warning) if the id is not queued.
    ///
    /// # Errors
    ///
    /// Returns `TetherError::InvalidOperation` if the replacement payload has
    /// a different operation type, or a storage error if the queue cannot be
    /// read or written.
    pub fn update(&self, id: &str, update: OperationUpdate) -> Result<bool, TetherError> {
        let _guard = self.lock();
        let mut operations = self.load()?;

        let Some(operation) = operations.iter_mut().find(|op| op.id == id) else {
            warn!(id, "Update of absent operation ignored");
            return Ok(false);
        };

        if let Some(payload) = update.operation {
            if payload.operation_type() != operation.operation_type() {
                return Err(TetherError::InvalidOperation(format!(
                    "Cannot change operation {id} from {} to {}",
                    operation.operation_type(),
                    payload.operation_type()
                )));
            }
            operation.operation = payload;
        }
        if let Some(last_attempt) = update.last_attempt {
            operation.last_attempt = last_attempt;
        }
        if let Some(error) = update.error {
            operation.error = error;
        }

        self.save(&operations)?;
        Ok(true)
    }

    /// Record a failed execution attempt.
    ///
    /// Increments the retry count and stamps the attempt time. Once the count
    /// reaches `retry.max_attempts` a terminal error is recorded; the
    /// operation stays queued for inspection but is no longer retried.
    ///
    /// Returns the updated operation, or `None` if the id is not queued.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read or written.
    pub fn record_retry_failure(
        &self,
        id: &str,
        reason: &str,
    ) -> Result<Option<PendingOperation>, TetherError> {
        let max_attempts = self.config.retry.max_attempts;

        let _guard = self.lock();
        let mut operations = self.load()?;

        let Some(operation) = operations.iter_mut().find(|op| op.id == id) else {
            warn!(id, "Retry failure recorded for absent operation");
            return Ok(None);
        };

        operation.retry_count = operation.retry_count.saturating_add(1);
        operation.last_attempt = Some(Utc::now());
        if operation.is_exhausted(max_attempts) {
            operation.error = Some(format!(
                "Max retry attempts ({max_attempts}) exceeded: {reason}"
            ));
            warn!(
                id,
                operation_type = operation.operation_type().as_str(),
                "Operation exhausted its retries"
            );
        }

        let updated = operation.clone();
        self.save(&operations)?;
        Ok(Some(updated))
    }

    /// Operations eligible for execution in the next pass, in execution order.
    ///
    /// Excludes operations that exhausted their retries and operations that
    /// failed within the base retry delay.
    #[must_use]
    pub fn select_retryable(&self) -> Vec<PendingOperation> {
        let max_attempts = self.config.retry.max_attempts;
        let debounce = self.debounce_window();
        let now = Utc::now();

        self.list_sorted()
            .into_iter()
            .filter(|op| !op.is_exhausted(max_attempts))
            .filter(|op| {
                op.last_attempt
                    .map_or(true, |at| now.signed_duration_since(at) >= debounce)
            })
            .collect()
    }

    fn debounce_window(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.config.base_retry_delay())
            .unwrap_or_else(|_| chrono::Duration::weeks(52))
    }

    /// Number of operations still eligible for automatic retry.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        let max_attempts = self.config.retry.max_attempts;
        self.list()
            .iter()
            .filter(|op| !op.is_exhausted(max_attempts))
            .count()
    }

    /// Get queue statistics.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        let max_attempts = self.config.retry.max_attempts;
        let operations = self.list();
        let retryable = self.select_retryable().len();
        let failed = operations
            .iter()
            .filter(|op| op.is_exhausted(max_attempts))
            .count();

        QueueStats {
            total: operations.len(),
            retryable,
            waiting: operations.len().saturating_sub(failed + retryable),
            failed,
            oldest_pending: operations
                .iter()
                .filter(|op| !op.is_exhausted(max_attempts))
                .map(|op| op.timestamp)
                .min(),
        }
    }

    /// Make an operation eligible for automatic retry again.
    ///
    /// This is the manual escape hatch for operations that exhausted their
    /// retries; it is the only path that lowers a retry count.
    ///
    /// # Errors
    ///
    /// Returns `TetherError::NotFound` if the id is not queued, or a storage
    /// error if the queue cannot be read or written.
    pub fn reset_retries(&self, id: &str) -> Result<PendingOperation, TetherError> {
        let _guard = self.lock();
        let mut operations = self.load()?;

        let operation = operations
            .iter_mut()
            .find(|op| op.id == id)
            .ok_or_else(|| TetherError::NotFound(format!("Operation {id}")))?;

        operation.retry_count = 0;
        operation.last_attempt = None;
        operation.error = None;

        let updated = operation.clone();
        self.save(&operations)?;
        info!(id, "Reset retries for operation");
        Ok(updated)
    }

    /// Drop every operation that exhausted its retries.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read or written.
    pub fn purge_failed(&self) -> Result<usize, TetherError> {
        let max_attempts = self.config.retry.max_attempts;

        let _guard = self.lock();
        let mut operations = self.load()?;
        let before = operations.len();
        operations.retain(|op| !op.is_exhausted(max_attempts));
        let purged = before - operations.len();

        if purged > 0 {
            self.save(&operations)?;
            info!(purged, "Purged failed operations");
        }
        Ok(purged)
    }

    /// Remove every operation (for testing/reset).
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be written.
    pub fn clear(&self) -> Result<(), TetherError> {
        let _guard = self.lock();
        self.store.remove_item(QUEUE_KEY)
    }
}

/// Queue statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Every queued operation
    pub total: usize,
    /// Eligible for the next pass
    pub retryable: usize,
    /// Failed recently, waiting out the retry delay
    pub waiting: usize,
    /// Retries exhausted
    pub failed: usize,
    /// Oldest operation that is not exhausted
    pub oldest_pending: Option<DateTime<Utc>>,
}
