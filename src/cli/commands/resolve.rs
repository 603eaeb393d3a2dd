//! Resolve command implementation.

use std::path::Path;

use serde_json::Value;

use crate::cli::args::OutputFormat;
use crate::error::TetherError;
use crate::features::conflict::{
    resolve_incident_report, resolve_safety_plan, Conflict, ConflictResolver, ConflictStrategy,
};
use crate::output::to_json;

/// Resolve a local/server pair read from two JSON files.
///
/// # Errors
///
/// Returns an error if either file cannot be read or is not JSON.
pub fn resolve(
    resolver: &ConflictResolver,
    strategy: &str,
    local: &Path,
    server: &Path,
    format: OutputFormat,
) -> Result<String, TetherError> {
    let local = read_json(local)?;
    let server = read_json(server)?;

    let (applied, resolved) = match strategy {
        "incident-report" => (strategy.to_string(), resolve_incident_report(&local, &server)),
        "safety-plan" => (strategy.to_string(), resolve_safety_plan(&local, &server)),
        name => {
            let parsed = ConflictStrategy::parse_lenient(name);
            let conflict = Conflict::new(local, server);
            (parsed.to_string(), resolver.resolve(&conflict, parsed))
        },
    };

    match format {
        OutputFormat::Json => to_json(&serde_json::json!({
            "strategy": applied,
            "resolved": resolved,
        })),
        OutputFormat::Pretty => to_json(&resolved),
    }
}

fn read_json(path: &Path) -> Result<Value, TetherError> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text)
        .map_err(|e| TetherError::Serialization(format!("{} is not valid JSON: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_pair(dir: &TempDir, local: &Value, server: &Value) -> (std::path::PathBuf, std::path::PathBuf) {
        let local_path = dir.path().join("local.json");
        let server_path = dir.path().join("server.json");
        std::fs::write(&local_path, local.to_string()).unwrap();
        std::fs::write(&server_path, server.to_string()).unwrap();
        (local_path, server_path)
    }

    #[test]
    fn test_resolve_merge() {
        let dir = TempDir::new().unwrap();
        let (local, server) = write_pair(&dir, &json!({ "a": null, "b": 3 }), &json!({ "a": 1, "b": 2 }));

        let output = resolve(&ConflictResolver::default(), "merge", &local, &server, OutputFormat::Json).unwrap();
        let parsed: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["strategy"], "merge");
        assert_eq!(parsed["resolved"], json!({ "a": 1, "b": 3 }));
    }

    #[test]
    fn test_resolve_unknown_strategy_reports_fallback() {
        let dir = TempDir::new().unwrap();
        let (local, server) = write_pair(&dir, &json!({ "v": 1 }), &json!({ "v": 2 }));

        let output = resolve(&ConflictResolver::default(), "newest", &local, &server, OutputFormat::Json).unwrap();
        let parsed: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["strategy"], "server-wins");
        assert_eq!(parsed["resolved"], json!({ "v": 2 }));
    }

    #[test]
    fn test_resolve_field_table() {
        let dir = TempDir::new().unwrap();
        let (local, server) = write_pair(
            &dir,
            &json!({ "description": "Full account", "caseNumber": "X" }),
            &json!({ "description": "Short", "caseNumber": "C-9" }),
        );

        let mut config = Config::default();
        config.features.conflict_resolution = false;
        let resolver = ConflictResolver::new(&config);

        let output = resolve(&resolver, "incident-report", &local, &server, OutputFormat::Pretty).unwrap();
        let parsed: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed, json!({ "description": "Full account", "caseNumber": "C-9" }));
    }

    #[test]
    fn test_resolve_invalid_json() {
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("local.json");
        std::fs::write(&local, "{oops").unwrap();

        let result = resolve(&ConflictResolver::default(), "merge", &local, &local, OutputFormat::Pretty);
        assert!(matches!(result, Err(TetherError::Serialization(_))));

        let missing = dir.path().join("missing.json");
        let result = resolve(&ConflictResolver::default(), "merge", &missing, &local, OutputFormat::Pretty);
        assert!(matches!(result, Err(TetherError::Io(_))));
    }
}
