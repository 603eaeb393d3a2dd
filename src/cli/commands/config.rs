//! Config command implementation.

use crate::cli::args::OutputFormat;
use crate::config::{Config, REQUIRED_SECTIONS};
use crate::error::TetherError;
use crate::output::to_json;

const REDACTED: &str = "<redacted>";

/// Show the effective configuration, or one section of it.
///
/// # Errors
///
/// Returns `TetherError::NotFound` for an unknown section, or an error if
/// serialization fails.
pub fn config(config: &Config, section: Option<&str>, format: OutputFormat) -> Result<String, TetherError> {
    let mut value = match section {
        Some(name) => config.section(name).ok_or_else(|| {
            TetherError::NotFound(format!(
                "Config section {name} (expected one of: {})",
                REQUIRED_SECTIONS.join(", ")
            ))
        })?,
        None => serde_yaml::to_value(config)
            .map_err(|e| TetherError::Serialization(format!("Failed to serialize config: {e}")))?,
    };

    let security = match section {
        Some("security") => Some(&mut value),
        Some(_) => None,
        None => value.get_mut("security"),
    };
    if let Some(serde_yaml::Value::Mapping(security)) = security {
        if let Some(key_material) = security.get_mut("key_material") {
            *key_material = serde_yaml::Value::from(REDACTED);
        }
    }

    match format {
        OutputFormat::Json => to_json(&value),
        OutputFormat::Pretty => serde_yaml::to_string(&value)
            .map(|yaml| yaml.trim_end().to_string())
            .map_err(|e| TetherError::Serialization(format!("Failed to serialize config: {e}"))),
    }
}
