//! Whole-record resolution strategies.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::updated_at;
use crate::config::{Config, Feature};
use crate::error::TetherError;
use crate::features::sync::OperationType;

/// Conflict resolution strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictStrategy {
    /// Server version wins
    ServerWins,
    /// Local version wins
    ClientWins,
    /// Newer `updatedAt` wins, ties go to the server
    LastWriteWins,
    /// Server version overlaid with every non-empty local field
    Merge,
}

impl ConflictStrategy {
    pub const ALL: [Self; 4] = [Self::ServerWins, Self::ClientWins, Self::LastWriteWins, Self::Merge];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ServerWins => "server-wins",
            Self::ClientWins => "client-wins",
            Self::LastWriteWins => "last-write-wins",
            Self::Merge => "merge",
        }
    }

    /// Parse a strategy name, falling back to server-wins for unknown names.
    #[must_use]
    pub fn parse_lenient(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            warn!("Unknown conflict strategy {name:?}, using server-wins");
            Self::ServerWins
        })
    }
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictStrategy {
    type Err = TetherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == normalized)
            .ok_or_else(|| TetherError::InvalidOperation(format!("Unknown conflict strategy: {s}")))
    }
}

/// Default strategy for each operation type.
///
/// Creations have no server copy yet, so the client wins. The server owns
/// assignment workflow state. Profile and safety-plan edits merge. Other
/// updates go to the newer side.
#[must_use]
pub const fn strategy_for(operation_type: OperationType) -> ConflictStrategy {
    match operation_type {
        OperationType::CreateIncident
        | OperationType::CreateSafetyPlan
        | OperationType::CreateWellbeingLog
        | OperationType::SendMessage => ConflictStrategy::ClientWins,
        OperationType::AcceptAssignment | OperationType::DeclineAssignment => {
            ConflictStrategy::ServerWins
        },
        OperationType::UpdateProfile | OperationType::UpdateSafetyPlan => ConflictStrategy::Merge,
        OperationType::UpdateIncident | OperationType::UpdateWellbeingLog => {
            ConflictStrategy::LastWriteWins
        },
    }
}

/// Local and server versions of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub local: Value,
    pub server: Value,
    /// Used when the local body has no `updatedAt`
    #[serde(default)]
    pub local_timestamp: Option<DateTime<Utc>>,
    /// Used when the server body has no `updatedAt`
    #[serde(default)]
    pub server_timestamp: Option<DateTime<Utc>>,
}

impl Conflict {
    #[must_use]
    pub const fn new(local: Value, server: Value) -> Self {
        Self {
            local,
            server,
            local_timestamp: None,
            server_timestamp: None,
        }
    }

    #[must_use]
    pub fn with_timestamps(
        mut self,
        local: Option<DateTime<Utc>>,
        server: Option<DateTime<Utc>>,
    ) -> Self {
        self.local_timestamp = local;
        self.server_timestamp = server;
        self
    }

    fn local_time(&self) -> Option<DateTime<Utc>> {
        updated_at(&self.local).or(self.local_timestamp)
    }

    fn server_time(&self) -> Option<DateTime<Utc>> {
        updated_at(&self.server).or(self.server_timestamp)
    }
}

/// Applies resolution strategies, subject to the `conflict_resolution` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictResolver {
    enabled: bool,
    default_strategy: ConflictStrategy,
}

impl Default for ConflictResolver {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl ConflictResolver {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            enabled: config.is_enabled(Feature::ConflictResolution),
            default_strategy: ConflictStrategy::parse_lenient(&config.conflict.default_strategy),
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub const fn default_strategy(&self) -> ConflictStrategy {
        self.default_strategy
    }

    /// Resolve with an explicit strategy.
    ///
    /// When conflict resolution is disabled the server version is returned
    /// whatever the strategy.
    #[must_use]
    pub fn resolve(&self, conflict: &Conflict, strategy: ConflictStrategy) -> Value {
        if !self.enabled {
            debug!("Conflict resolution disabled, keeping server version");
            return conflict.server.clone();
        }

        match strategy {
            ConflictStrategy::ServerWins => conflict.server.clone(),
            ConflictStrategy::ClientWins => conflict.local.clone(),
            ConflictStrategy::LastWriteWins => last_write_wins(conflict),
            ConflictStrategy::Merge => merge(&conflict.local, &conflict.server),
        }
    }

    /// Resolve with a strategy given by name. Unknown names resolve as server-wins.
    #[must_use]
    pub fn resolve_named(&self, conflict: &Conflict, strategy: &str) -> Value {
        self.resolve(conflict, ConflictStrategy::parse_lenient(strategy))
    }

    /// Resolve with the configured default strategy.
    #[must_use]
    pub fn resolve_with_default(&self, conflict: &Conflict) -> Value {
        self.resolve(conflict, self.default_strategy)
    }

    /// Resolve with the default strategy for the operation that produced the conflict.
    #[must_use]
    pub fn resolve_by_operation_type(&self, conflict: &Conflict, operation_type: OperationType) -> Value {
        self.resolve(conflict, strategy_for(operation_type))
    }
}

fn last_write_wins(conflict: &Conflict) -> Value {
    // A side with no timestamp never beats one that has it
    if conflict.local_time() > conflict.server_time() {
        conflict.local.clone()
    } else {
        conflict.server.clone()
    }
}

fn merge(local: &Value, server: &Value) -> Value {
    let (Value::Object(local_fields), Value::Object(server_fields)) = (local, server) else {
        return server.clone();
    };

    let mut merged = server_fields.clone();
    for (key, value) in local_fields {
        if !is_blank(value) {
            merged.insert(key.clone(), value.clone());
        }
    }
    Value::Object(merged)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    fn resolver() -> ConflictResolver {
        ConflictResolver::default()
    }

    fn conflict() -> Conflict {
        Conflict::new(json!({ "status": "local" }), json!({ "status": "server" }))
    }

    #[test]
    fn test_parse_strategy() {
        assert_eq!("server-wins".parse::<ConflictStrategy>().unwrap(), ConflictStrategy::ServerWins);
        assert_eq!("client_wins".parse::<ConflictStrategy>().unwrap(), ConflictStrategy::ClientWins);
        assert_eq!(" Last-Write-Wins ".parse::<ConflictStrategy>().unwrap(), ConflictStrategy::LastWriteWins);
        assert!("newest".parse::<ConflictStrategy>().is_err());

        for strategy in ConflictStrategy::ALL {
            assert_eq!(strategy.to_string().parse::<ConflictStrategy>().unwrap(), strategy);
        }
    }

    #[test]
    fn test_server_and_client_wins() {
        let c = conflict();
        assert_eq!(resolver().resolve(&c, ConflictStrategy::ServerWins), c.server);
        assert_eq!(resolver().resolve(&c, ConflictStrategy::ClientWins), c.local);
    }

    #[test]
    fn test_last_write_wins_newer_local() {
        let c = Conflict::new(
            json!({ "v": "local", "updatedAt": "2024-03-01T12:00:00Z" }),
            json!({ "v": "server", "updatedAt": "2024-03-01T11:00:00Z" }),
        );
        assert_eq!(resolver().resolve(&c, ConflictStrategy::LastWriteWins), c.local);
    }

    #[test]
    fn test_last_write_wins_tie_goes_to_server() {
        let c = Conflict::new(
            json!({ "v": "local", "updatedAt": "2024-03-01T12:00:00Z" }),
            json!({ "v": "server", "updatedAt": "2024-03-01T12:00:00Z" }),
        );
        assert_eq!(resolver().resolve(&c, ConflictStrategy::LastWriteWins), c.server);
    }

    #[test]
    fn test_last_write_wins_falls_back_to_envelope() {
        let newer_local = conflict().with_timestamps(Some(at(12)), Some(at(11)));
        assert_eq!(
            resolver().resolve(&newer_local, ConflictStrategy::LastWriteWins),
            newer_local.local
        );

        let newer_server = conflict().with_timestamps(Some(at(9)), Some(at(11)));
        assert_eq!(
            resolver().resolve(&newer_server, ConflictStrategy::LastWriteWins),
            newer_server.server
        );

        // Body timestamp takes precedence over the envelope
        let body_wins = Conflict::new(
            json!({ "v": "local", "updatedAt": "2024-03-01T08:00:00Z" }),
            json!({ "v": "server" }),
        )
        .with_timestamps(Some(at(23)), Some(at(10)));
        assert_eq!(
            resolver().resolve(&body_wins, ConflictStrategy::LastWriteWins),
            body_wins.server
        );
    }

    #[test]
    fn test_last_write_wins_without_timestamps_keeps_server() {
        let c = conflict();
        assert_eq!(resolver().resolve(&c, ConflictStrategy::LastWriteWins), c.server);
    }

    #[test]
    fn test_merge() {
        let c = Conflict::new(json!({ "a": null, "b": 3 }), json!({ "a": 1, "b": 2 }));
        assert_eq!(resolver().resolve(&c, ConflictStrategy::Merge), json!({ "a": 1, "b": 3 }));
    }

    #[test]
    fn test_merge_skips_empty_strings_and_keeps_server_only_fields() {
        let c = Conflict::new(
            json!({ "name": "", "phone": "555-0100", "pronouns": "they/them" }),
            json!({ "name": "Sam", "phone": "555-0199", "caseNumber": "C-42" }),
        );
        assert_eq!(
            resolver().resolve(&c, ConflictStrategy::Merge),
            json!({
                "name": "Sam",
                "phone": "555-0100",
                "pronouns": "they/them",
                "caseNumber": "C-42",
            })
        );
    }

    #[test]
    fn test_merge_non_objects_keeps_server() {
        let c = Conflict::new(json!([1, 2]), json!({ "a": 1 }));
        assert_eq!(resolver().resolve(&c, ConflictStrategy::Merge), json!({ "a": 1 }));
    }

    #[test]
    fn test_unknown_strategy_name_falls_back_to_server() {
        let c = conflict();
        assert_eq!(resolver().resolve_named(&c, "most-recent"), c.server);
        assert_eq!(resolver().resolve_named(&c, "client-wins"), c.local);
    }

    #[test]
    fn test_disabled_resolution_always_keeps_server() {
        let mut config = Config::default();
        config.features.conflict_resolution = false;
        let resolver = ConflictResolver::new(&config);
        let c = conflict();

        for strategy in ConflictStrategy::ALL {
            assert_eq!(resolver.resolve(&c, strategy), c.server);
        }
        assert_eq!(
            resolver.resolve_by_operation_type(&c, OperationType::CreateIncident),
            c.server
        );
    }

    #[test]
    fn test_default_strategy_from_config() {
        let mut config = Config::default();
        config.conflict.default_strategy = "client-wins".to_string();
        let c = conflict();

        let resolver = ConflictResolver::new(&config);
        assert_eq!(resolver.default_strategy(), ConflictStrategy::ClientWins);
        assert_eq!(resolver.resolve_with_default(&c), c.local);

        config.conflict.default_strategy = "bogus".to_string();
        assert_eq!(
            ConflictResolver::new(&config).default_strategy(),
            ConflictStrategy::ServerWins
        );
    }

    #[test]
    fn test_strategy_by_operation_type() {
        assert_eq!(strategy_for(OperationType::CreateIncident), ConflictStrategy::ClientWins);
        assert_eq!(strategy_for(OperationType::CreateSafetyPlan), ConflictStrategy::ClientWins);
        assert_eq!(strategy_for(OperationType::AcceptAssignment), ConflictStrategy::ServerWins);
        assert_eq!(strategy_for(OperationType::DeclineAssignment), ConflictStrategy::ServerWins);
        assert_eq!(strategy_for(OperationType::UpdateProfile), ConflictStrategy::Merge);
        assert_eq!(strategy_for(OperationType::UpdateSafetyPlan), ConflictStrategy::Merge);
        assert_eq!(strategy_for(OperationType::UpdateIncident), ConflictStrategy::LastWriteWins);

        let c = conflict();
        assert_eq!(
            resolver().resolve_by_operation_type(&c, OperationType::CreateIncident),
            c.local
        );
        assert_eq!(
            resolver().resolve_by_operation_type(&c, OperationType::AcceptAssignment),
            c.server
        );
    }

    #[test]
    fn test_creation_strategies_match_creation_types() {
        for operation_type in OperationType::ALL {
            let client_wins = strategy_for(operation_type) == ConflictStrategy::ClientWins;
            assert_eq!(client_wins, operation_type.is_creation(), "{operation_type}");
        }
    }
}
