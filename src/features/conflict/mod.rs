//! Conflict resolution between local and server versions of one entity.
//!
//! Everything here is pure: inputs are JSON bodies, outputs are new JSON
//! bodies, and no path returns an error. Callers decide when to resolve;
//! the sync orchestrator never does it on its own.

pub mod fields;
pub mod strategy;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

pub use fields::{
    resolve_fields, resolve_incident_report, resolve_safety_plan, FieldPolicy,
    INCIDENT_REPORT_FIELDS, SAFETY_PLAN_FIELDS,
};
pub use strategy::{strategy_for, Conflict, ConflictResolver, ConflictStrategy};

/// Name of the modification-time field carried by entity bodies.
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// Parse the `updatedAt` field of an entity body.
///
/// Accepts an RFC 3339 string or integer milliseconds since the epoch.
/// Anything else reads as absent.
pub(crate) fn updated_at(entity: &Value) -> Option<DateTime<Utc>> {
    match entity.get(UPDATED_AT_FIELD)? {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => Utc.timestamp_millis_opt(n.as_i64()?).single(),
        _ => None,
    }
}
