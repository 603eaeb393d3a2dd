//! Output formatting for tether.
//!
//! This module provides formatters for displaying queue data in various formats.

mod json;
mod pretty;

use crate::cli::args::OutputFormat;
use crate::error::TetherError;
use crate::features::sync::PendingOperation;

pub use json::*;
pub use pretty::*;

/// Format queued operations based on output format
///
/// # Errors
///
/// Returns `TetherError::Serialization` if JSON serialization fails.
pub fn format_operations(
    operations: &[PendingOperation],
    title: &str,
    max_attempts: u32,
    format: OutputFormat,
) -> Result<String, TetherError> {
    match format {
        OutputFormat::Pretty => Ok(format_operations_pretty(operations, title, max_attempts)),
        OutputFormat::Json => format_operations_json(operations, title),
    }
}

/// Format a single operation based on output format
///
/// # Errors
///
/// Returns `TetherError::Serialization` if JSON serialization fails.
pub fn format_operation(operation: &PendingOperation, format: OutputFormat) -> Result<String, TetherError> {
    match format {
        OutputFormat::Pretty => Ok(format_operation_pretty(operation)),
        OutputFormat::Json => to_json(operation),
    }
}
