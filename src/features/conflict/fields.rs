//! Per-field resolution for user-authored records.
//!
//! Three tiers, checked in order for every field present on either side:
//! 1. High-priority fields (entered by the user) keep a non-empty local value.
//! 2. Server-priority fields keep the server value.
//! 3. Everything else comes from the side with the newer `updatedAt`.

use serde_json::{Map, Value};

use super::updated_at;

/// Field tables for one entity family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPolicy {
    pub high_priority: &'static [&'static str],
    pub server_priority: &'static [&'static str],
}

impl FieldPolicy {
    /// Resolve two versions of an entity under this policy.
    #[must_use]
    pub fn resolve(&self, local: &Value, server: &Value) -> Value {
        resolve_fields(local, server, self.high_priority, self.server_priority)
    }
}

/// Incident reports: the account of what happened belongs to the reporter,
/// case handling belongs to the server.
pub const INCIDENT_REPORT_FIELDS: FieldPolicy = FieldPolicy {
    high_priority: &["description", "location", "evidence"],
    server_priority: &[
        "caseNumber",
        "assignedTo",
        "assignmentStatus",
        "sharedWith",
        "reviewedBy",
        "reviewedAt",
    ],
};

pub const SAFETY_PLAN_FIELDS: FieldPolicy = FieldPolicy {
    high_priority: &["emergencyContacts", "copingStrategies"],
    server_priority: &["sharedWith", "reviewedBy", "reviewedAt"],
};

/// Resolve field by field.
///
/// If either side is not a JSON object the server version is returned.
/// Not subject to the `conflict_resolution` flag.
#[must_use]
pub fn resolve_fields(
    local: &Value,
    server: &Value,
    high_priority_fields: &[&str],
    server_priority_fields: &[&str],
) -> Value {
    let (Value::Object(local_fields), Value::Object(server_fields)) = (local, server) else {
        return server.clone();
    };

    let local_is_newer = updated_at(local) > updated_at(server);
    let mut resolved = Map::new();

    let keys = server_fields
        .keys()
        .chain(local_fields.keys().filter(|k| !server_fields.contains_key(*k)));

    for key in keys {
        let local_value = local_fields.get(key);
        let server_value = server_fields.get(key);

        let winner = if high_priority_fields.contains(&key.as_str())
            && local_value.is_some_and(|v| !is_empty(v))
        {
            local_value
        } else if server_priority_fields.contains(&key.as_str()) {
            server_value
        } else if local_is_newer {
            local_value.or(server_value)
        } else {
            server_value.or(local_value)
        };

        if let Some(value) = winner {
            resolved.insert(key.clone(), value.clone());
        }
    }

    Value::Object(resolved)
}

/// Resolve an incident report with [`INCIDENT_REPORT_FIELDS`].
#[must_use]
pub fn resolve_incident_report(local: &Value, server: &Value) -> Value {
    INCIDENT_REPORT_FIELDS.resolve(local, server)
}

/// Resolve a safety plan with [`SAFETY_PLAN_FIELDS`].
#[must_use]
pub fn resolve_safety_plan(local: &Value, server: &Value) -> Value {
    SAFETY_PLAN_FIELDS.resolve(local, server)
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_entered_fields_keep_local_value() {
        let local = json!({
            "description": "Man followed me from the bus stop to my door",
            "evidence": ["photo-1.jpg"],
            "updatedAt": "2024-03-01T09:00:00Z",
        });
        let server = json!({
            "description": "Followed home",
            "evidence": [],
            "updatedAt": "2024-03-01T12:00:00Z",
        });

        let resolved = resolve_incident_report(&local, &server);
        assert_eq!(resolved["description"], local["description"]);
        assert_eq!(resolved["evidence"], json!(["photo-1.jpg"]));
        assert_eq!(resolved["updatedAt"], server["updatedAt"]);
    }

    #[test]
    fn test_empty_local_user_field_does_not_clobber_server() {
        let local = json!({ "location": "", "evidence": [] });
        let server = json!({ "location": "Main St", "evidence": ["audio.m4a"] });

        let resolved = resolve_incident_report(&local, &server);
        assert_eq!(resolved["location"], "Main St");
        assert_eq!(resolved["evidence"], json!(["audio.m4a"]));
    }

    #[test]
    fn test_server_owned_fields_keep_server_value() {
        let local = json!({
            "caseNumber": "LOCAL",
            "assignmentStatus": "accepted",
            "updatedAt": "2024-03-02T00:00:00Z",
        });
        let server = json!({
            "caseNumber": "C-1042",
            "assignmentStatus": "pending",
            "updatedAt": "2024-03-01T00:00:00Z",
        });

        let resolved = resolve_incident_report(&local, &server);
        assert_eq!(resolved["caseNumber"], "C-1042");
        assert_eq!(resolved["assignmentStatus"], "pending");
    }

    #[test]
    fn test_server_owned_field_missing_on_server_is_dropped() {
        let local = json!({ "reviewedBy": "someone", "category": "threat" });
        let server = json!({ "category": "threat" });

        let resolved = resolve_incident_report(&local, &server);
        assert!(resolved.get("reviewedBy").is_none());
    }

    #[test]
    fn test_other_fields_follow_newer_side() {
        let local = json!({ "category": "harassment", "severity": 4, "updatedAt": 1_709_290_800_000_i64 });
        let server = json!({ "category": "threat", "updatedAt": 1_709_287_200_000_i64 });

        let resolved = resolve_incident_report(&local, &server);
        assert_eq!(resolved["category"], "harassment");
        assert_eq!(resolved["severity"], 4);
        assert_eq!(resolved["updatedAt"], local["updatedAt"]);

        // Server newer: its values win, local-only fields survive
        let resolved = resolve_incident_report(&server, &local);
        assert_eq!(resolved["category"], "harassment");
        assert_eq!(resolved["severity"], 4);
    }

    #[test]
    fn test_equal_timestamps_favor_server() {
        let local = json!({ "category": "harassment", "updatedAt": "2024-03-01T12:00:00Z" });
        let server = json!({ "category": "threat", "updatedAt": "2024-03-01T12:00:00Z" });

        assert_eq!(resolve_incident_report(&local, &server)["category"], "threat");
    }

    #[test]
    fn test_safety_plan_tables() {
        let local = json!({
            "emergencyContacts": ["Alex 555-0100"],
            "copingStrategies": ["Call a friend"],
            "sharedWith": ["local-guess"],
            "warningSigns": ["Not sleeping"],
        });
        let server = json!({
            "emergencyContacts": ["Old contact"],
            "copingStrategies": [],
            "sharedWith": ["caseworker-9"],
            "warningSigns": ["Isolation"],
            "updatedAt": "2024-03-01T12:00:00Z",
        });

        let resolved = resolve_safety_plan(&local, &server);
        assert_eq!(resolved["emergencyContacts"], json!(["Alex 555-0100"]));
        assert_eq!(resolved["copingStrategies"], json!(["Call a friend"]));
        assert_eq!(resolved["sharedWith"], json!(["caseworker-9"]));
        assert_eq!(resolved["warningSigns"], json!(["Isolation"]));
    }

    #[test]
    fn test_custom_tables() {
        let local = json!({ "nickname": "Sam", "role": "admin" });
        let server = json!({ "nickname": "S.", "role": "member" });

        let resolved = resolve_fields(&local, &server, &["nickname"], &["role"]);
        assert_eq!(resolved, json!({ "nickname": "Sam", "role": "member" }));
    }

    #[test]
    fn test_non_object_input_returns_server() {
        let server = json!({ "description": "x" });
        assert_eq!(resolve_incident_report(&json!(null), &server), server);
        assert_eq!(resolve_incident_report(&server, &json!("gone")), json!("gone"));
    }
}
