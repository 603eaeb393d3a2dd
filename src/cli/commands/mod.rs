//! Command implementations for tether.
//!
//! Every command returns the text to print; `main` does the printing.

mod config;
mod queue;
mod resolve;

pub use config::config;
pub use queue::{add, list, purge, remove, retry, status};
pub use resolve::resolve;

use crate::cli::args::{Commands, OutputFormat};
use crate::engine::SyncEngine;
use crate::error::TetherError;
use crate::output::to_json;

/// Run one command against an opened engine.
///
/// # Errors
///
/// Returns an error if the command fails or output formatting fails.
pub fn execute(engine: &SyncEngine, command: Commands, format: OutputFormat) -> Result<String, TetherError> {
    match command {
        Commands::Status => status(engine, format),
        Commands::List { retryable, limit } => list(engine, retryable, limit, format),
        Commands::Add {
            operation_type,
            payload,
        } => add(engine, &operation_type, &payload, format),
        Commands::Remove { id } => remove(engine, &id, format),
        Commands::Retry { all, id } => retry(engine, all, id.as_deref(), format),
        Commands::Purge { all, force } => purge(engine, all, force, format),
        Commands::Config { section } => config(engine.config(), section.as_deref(), format),
        Commands::Resolve {
            strategy,
            local,
            server,
        } => resolve(engine.resolver(), &strategy, &local, &server, format),
        Commands::ClearSensitive { force } => clear_sensitive(engine, force, format),
    }
}

/// Execute clear-sensitive command
///
/// # Errors
///
/// Returns an error without `--force`, or if a key cannot be removed.
pub fn clear_sensitive(engine: &SyncEngine, force: bool, format: OutputFormat) -> Result<String, TetherError> {
    if !force {
        return Err(TetherError::InvalidOperation(
            "Use --force to delete all sensitive values".to_string(),
        ));
    }

    engine.store().clear_sensitive_data()?;
    let keys = &engine.config().security.sensitive_keys;

    match format {
        OutputFormat::Json => to_json(&serde_json::json!({ "cleared": keys })),
        OutputFormat::Pretty => Ok(format!("Cleared {} sensitive keys", keys.len())),
    }
}
