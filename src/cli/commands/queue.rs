//! Queue inspection and maintenance commands.

use serde_json::Value;

use crate::cli::args::OutputFormat;
use crate::engine::SyncEngine;
use crate::error::TetherError;
use crate::features::sync::{OperationPayload, OperationType};
use crate::output::{format_operation, format_operations, format_status_pretty, to_json};

/// Show queue and sync status.
///
/// # Errors
///
/// Returns an error if output formatting fails.
pub fn status(engine: &SyncEngine, format: OutputFormat) -> Result<String, TetherError> {
    let stats = engine.queue().stats();
    let sync = engine.orchestrator().sync_status();

    match format {
        OutputFormat::Json => to_json(&serde_json::json!({
            "queue": stats,
            "sync": sync,
        })),
        OutputFormat::Pretty => Ok(format_status_pretty(&stats, &sync)),
    }
}

/// List queued operations in execution order.
///
/// # Errors
///
/// Returns an error if output formatting fails.
pub fn list(
    engine: &SyncEngine,
    retryable: bool,
    limit: usize,
    format: OutputFormat,
) -> Result<String, TetherError> {
    let (title, mut operations) = if retryable {
        ("Retryable Operations", engine.queue().select_retryable())
    } else {
        ("Queued Operations", engine.queue().list_sorted())
    };
    operations.truncate(limit);

    format_operations(&operations, title, engine.config().retry.max_attempts, format)
}

/// Queue an operation.
///
/// # Errors
///
/// Returns an error if the type is unknown, the payload does not match the
/// type, or the queue cannot be written.
pub fn add(
    engine: &SyncEngine,
    operation_type: &str,
    payload: &str,
    format: OutputFormat,
) -> Result<String, TetherError> {
    let operation_type: OperationType = operation_type.parse()?;
    let body: Value = serde_json::from_str(payload)
        .map_err(|e| TetherError::Serialization(format!("Payload is not valid JSON: {e}")))?;

    let operation = engine.enqueue(OperationPayload::from_json(operation_type, body)?)?;

    match format {
        OutputFormat::Json => to_json(&operation),
        OutputFormat::Pretty => Ok(format!(
            "Queued {} operation (ID: {})",
            operation_type.display_name(),
            operation.id
        )),
    }
}

/// Remove an operation.
///
/// # Errors
///
/// Returns `TetherError::NotFound` if the id is not queued.
pub fn remove(engine: &SyncEngine, id: &str, format: OutputFormat) -> Result<String, TetherError> {
    if !engine.queue().remove(id)? {
        return Err(TetherError::NotFound(format!("Operation {id}")));
    }

    match format {
        OutputFormat::Json => to_json(&serde_json::json!({ "removed": id })),
        OutputFormat::Pretty => Ok(format!("Removed operation {id}")),
    }
}

/// Reset retry bookkeeping for one operation, or for every failed one.
///
/// # Errors
///
/// Returns an error if neither an id nor `--all` is given, the id is not
/// queued, or the queue cannot be written.
pub fn retry(
    engine: &SyncEngine,
    all: bool,
    id: Option<&str>,
    format: OutputFormat,
) -> Result<String, TetherError> {
    let queue = engine.queue();

    if let Some(id) = id {
        let operation = queue.reset_retries(id)?;
        return match format {
            OutputFormat::Json => format_operation(&operation, format),
            OutputFormat::Pretty => Ok(format!("Reset operation {id} for retry")),
        };
    }

    if !all {
        return Err(TetherError::InvalidOperation(
            "Specify --all or provide an operation ID".to_string(),
        ));
    }

    let max_attempts = engine.config().retry.max_attempts;
    let failed: Vec<String> = queue
        .list()
        .into_iter()
        .filter(|op| op.is_exhausted(max_attempts))
        .map(|op| op.id)
        .collect();
    for id in &failed {
        queue.reset_retries(id)?;
    }

    match format {
        OutputFormat::Json => to_json(&serde_json::json!({ "reset": failed.len() })),
        OutputFormat::Pretty => Ok(format!("Reset {} failed operations for retry", failed.len())),
    }
}

/// Delete failed operations, or everything with `--all --force`.
///
/// # Errors
///
/// Returns an error if `--all` is given without `--force`, or the queue
/// cannot be written.
pub fn purge(engine: &SyncEngine, all: bool, force: bool, format: OutputFormat) -> Result<String, TetherError> {
    if all {
        if !force {
            return Err(TetherError::InvalidOperation(
                "Use --force to delete all operations".to_string(),
            ));
        }
        let count = engine.queue().list().len();
        engine.queue().clear()?;

        return match format {
            OutputFormat::Json => to_json(&serde_json::json!({ "purged": count })),
            OutputFormat::Pretty => Ok(format!("Deleted all {count} operations")),
        };
    }

    let count = engine.queue().purge_failed()?;
    match format {
        OutputFormat::Json => to_json(&serde_json::json!({ "purged": count })),
        OutputFormat::Pretty => Ok(format!("Deleted {count} failed operations")),
    }
}
