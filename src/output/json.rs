//! JSON output formatting for tether.

use serde::Serialize;
use serde_json::json;

use crate::error::TetherError;
use crate::features::sync::PendingOperation;

/// Format queued operations as JSON
///
/// # Errors
///
/// Returns `TetherError::Serialization` if JSON serialization fails.
pub fn format_operations_json(operations: &[PendingOperation], title: &str) -> Result<String, TetherError> {
    let output = json!({
        "list": title,
        "count": operations.len(),
        "items": operations
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Format any serializable value as JSON
///
/// # Errors
///
/// Returns `TetherError::Serialization` if JSON serialization fails.
pub fn to_json<T: Serialize>(value: &T) -> Result<String, TetherError> {
    Ok(serde_json::to_string_pretty(value)?)
}
