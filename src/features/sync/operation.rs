//! Operation types for the sync queue.
//!
//! Defines the closed set of mutations producers can queue and their
//! payloads. The engine never looks inside a payload; it only uses the
//! variant tag to pick a priority and hands the payload to the executor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::PriorityLevel;
use crate::error::TetherError;

/// Operation types that can be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    /// Create an incident report
    CreateIncident,
    /// Edit an incident report
    UpdateIncident,
    /// Create a safety plan
    CreateSafetyPlan,
    /// Edit a safety plan
    UpdateSafetyPlan,
    /// Accept a case assignment
    AcceptAssignment,
    /// Decline a case assignment
    DeclineAssignment,
    /// Record a wellbeing check-in
    CreateWellbeingLog,
    /// Edit a wellbeing check-in
    UpdateWellbeingLog,
    /// Send a message to a case worker
    SendMessage,
    /// Edit the user's profile
    UpdateProfile,
}

impl OperationType {
    /// Every operation type, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::CreateIncident,
        Self::UpdateIncident,
        Self::CreateSafetyPlan,
        Self::UpdateSafetyPlan,
        Self::AcceptAssignment,
        Self::DeclineAssignment,
        Self::CreateWellbeingLog,
        Self::UpdateWellbeingLog,
        Self::SendMessage,
        Self::UpdateProfile,
    ];

    /// Get the display name for this operation type.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::CreateIncident => "Create Incident",
            Self::UpdateIncident => "Update Incident",
            Self::CreateSafetyPlan => "Create Safety Plan",
            Self::UpdateSafetyPlan => "Update Safety Plan",
            Self::AcceptAssignment => "Accept Assignment",
            Self::DeclineAssignment => "Decline Assignment",
            Self::CreateWellbeingLog => "Create Wellbeing Log",
            Self::UpdateWellbeingLog => "Update Wellbeing Log",
            Self::SendMessage => "Send Message",
            Self::UpdateProfile => "Update Profile",
        }
    }

    /// Stable identifier, as used in persisted records and on the command line.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CreateIncident => "create_incident",
            Self::UpdateIncident => "update_incident",
            Self::CreateSafetyPlan => "create_safety_plan",
            Self::UpdateSafetyPlan => "update_safety_plan",
            Self::AcceptAssignment => "accept_assignment",
            Self::DeclineAssignment => "decline_assignment",
            Self::CreateWellbeingLog => "create_wellbeing_log",
            Self::UpdateWellbeingLog => "update_wellbeing_log",
            Self::SendMessage => "send_message",
            Self::UpdateProfile => "update_profile",
        }
    }

    /// Priority band for this operation type.
    ///
    /// Creations of safety-critical records go first since nothing else can
    /// reference them until they exist server-side; profile edits go last.
    #[must_use]
    pub const fn priority_level(&self) -> PriorityLevel {
        match self {
            Self::CreateIncident | Self::CreateSafetyPlan => PriorityLevel::Critical,
            Self::UpdateIncident
            | Self::UpdateSafetyPlan
            | Self::AcceptAssignment
            | Self::DeclineAssignment => PriorityLevel::High,
            Self::CreateWellbeingLog | Self::UpdateWellbeingLog | Self::SendMessage => {
                PriorityLevel::Medium
            },
            Self::UpdateProfile => PriorityLevel::Low,
        }
    }

    /// Whether this operation creates a record the server has not seen yet.
    #[must_use]
    pub const fn is_creation(&self) -> bool {
        matches!(
            self,
            Self::CreateIncident | Self::CreateSafetyPlan | Self::CreateWellbeingLog | Self::SendMessage
        )
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for OperationType {
    type Err = TetherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| TetherError::InvalidOperation(format!("Unknown operation type: {s}")))
    }
}

/// Payload for creating an incident report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentDraft {
    /// Client-generated id, echoed back by the server on creation
    pub client_ref: String,
    pub category: String,
    pub description: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
    /// References to locally captured evidence (photos, recordings)
    #[serde(default)]
    pub evidence: Vec<String>,
}

/// Payload for creating a safety plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyPlanDraft {
    pub client_ref: String,
    #[serde(default)]
    pub emergency_contacts: Vec<String>,
    #[serde(default)]
    pub coping_strategies: Vec<String>,
    #[serde(default)]
    pub warning_signs: Vec<String>,
}

/// Payload for accepting or declining an assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentResponse {
    pub assignment_id: String,
    #[serde(default)]
    pub note: Option<String>,
}

/// Payload for creating a wellbeing log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WellbeingEntry {
    pub client_ref: String,
    /// Self-reported mood, 1 (worst) to 10 (best)
    pub mood: u8,
    #[serde(default)]
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Payload for sending a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDraft {
    pub thread_id: String,
    pub body: String,
}

/// Partial update of an existing record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPatch {
    /// Server id of the record being edited
    pub record_id: String,
    /// Changed fields only
    pub changes: Map<String, Value>,
}

/// Partial update of the user's own profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilePatch {
    pub changes: Map<String, Value>,
}

/// A queued mutation: the operation type plus its typed payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum OperationPayload {
    CreateIncident(IncidentDraft),
    UpdateIncident(RecordPatch),
    CreateSafetyPlan(SafetyPlanDraft),
    UpdateSafetyPlan(RecordPatch),
    AcceptAssignment(AssignmentResponse),
    DeclineAssignment(AssignmentResponse),
    CreateWellbeingLog(WellbeingEntry),
    UpdateWellbeingLog(RecordPatch),
    SendMessage(MessageDraft),
    UpdateProfile(ProfilePatch),
}

impl OperationPayload {
    /// The operation type this payload belongs to.
    #[must_use]
    pub const fn operation_type(&self) -> OperationType {
        match self {
            Self::CreateIncident(_) => OperationType::CreateIncident,
            Self::UpdateIncident(_) => OperationType::UpdateIncident,
            Self::CreateSafetyPlan(_) => OperationType::CreateSafetyPlan,
            Self::UpdateSafetyPlan(_) => OperationType::UpdateSafetyPlan,
            Self::AcceptAssignment(_) => OperationType::AcceptAssignment,
            Self::DeclineAssignment(_) => OperationType::DeclineAssignment,
            Self::CreateWellbeingLog(_) => OperationType::CreateWellbeingLog,
            Self::UpdateWellbeingLog(_) => OperationType::UpdateWellbeingLog,
            Self::SendMessage(_) => OperationType::SendMessage,
            Self::UpdateProfile(_) => OperationType::UpdateProfile,
        }
    }

    /// Build a payload from an operation type and its JSON body.
    ///
    /// # Errors
    ///
    /// Returns `TetherError::Serialization` if the body does not match the
    /// payload shape of `operation_type`.
    pub fn from_json(operation_type: OperationType, body: Value) -> Result<Self, TetherError> {
        let tagged = serde_json::json!({
            "type": operation_type.as_str(),
            "payload": body,
        });
        serde_json::from_value(tagged).map_err(|e| {
            TetherError::Serialization(format!("Invalid {operation_type} payload: {e}"))
        })
    }

    /// Id of the entity this mutation targets, if it already exists server-side.
    #[must_use]
    pub fn target_id(&self) -> Option<&str> {
        match self {
            Self::UpdateIncident(patch)
            | Self::UpdateSafetyPlan(patch)
            | Self::UpdateWellbeingLog(patch) => Some(&patch.record_id),
            Self::AcceptAssignment(response) | Self::DeclineAssignment(response) => {
                Some(&response.assignment_id)
            },
            Self::SendMessage(message) => Some(&message.thread_id),
            Self::CreateIncident(_)
            | Self::CreateSafetyPlan(_)
            | Self::CreateWellbeingLog(_)
            | Self::UpdateProfile(_) => None,
        }
    }
}

/// A queued operation with retry metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    /// Unique ID
    pub id: String,
    /// Operation type and payload
    pub operation: OperationPayload,
    /// Execution weight, fixed at enqueue time
    pub priority: u32,
    /// When the operation was queued
    pub timestamp: DateTime<Utc>,
    /// Number of failed execution attempts
    pub retry_count: u32,
    /// Last failed attempt
    #[serde(default)]
    pub last_attempt: Option<DateTime<Utc>>,
    /// Terminal error, set once retries are exhausted
    #[serde(default)]
    pub error: Option<String>,
}

impl PendingOperation {
    /// Create a fresh operation with a new id and the current timestamp.
    #[must_use]
    pub fn new(operation: OperationPayload, priority: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            operation,
            priority,
            timestamp: Utc::now(),
            retry_count: 0,
            last_attempt: None,
            error: None,
        }
    }

    /// Get the operation type.
    #[must_use]
    pub const fn operation_type(&self) -> OperationType {
        self.operation.operation_type()
    }

    /// Whether retries are exhausted.
    #[must_use]
    pub const fn is_exhausted(&self, max_attempts: u32) -> bool {
        self.retry_count >= max_attempts
    }
}

/// Partial update for [`PendingOperation`]; `None` leaves a field unchanged.
///
/// Priority and retry count are not updatable here: priority is fixed at
/// enqueue time and the retry count only moves through the queue's retry
/// bookkeeping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationUpdate {
    /// Replacement payload; must keep the same operation type
    pub operation: Option<OperationPayload>,
    pub last_attempt: Option<Option<DateTime<Utc>>>,
    pub error: Option<Option<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn incident() -> OperationPayload {
        OperationPayload::CreateIncident(IncidentDraft {
            client_ref: "local-1".to_string(),
            category: "harassment".to_string(),
            description: "Followed home from the bus stop".to_string(),
            location: Some("Elm St".to_string()),
            occurred_at: None,
            evidence: vec![],
        })
    }

    #[test]
    fn test_operation_type_display() {
        assert_eq!(OperationType::CreateIncident.display_name(), "Create Incident");
        assert_eq!(OperationType::UpdateProfile.to_string(), "Update Profile");
    }

    #[test]
    fn test_operation_type_priority_levels() {
        assert_eq!(OperationType::CreateIncident.priority_level(), PriorityLevel::Critical);
        assert_eq!(OperationType::AcceptAssignment.priority_level(), PriorityLevel::High);
        assert_eq!(OperationType::SendMessage.priority_level(), PriorityLevel::Medium);
        assert_eq!(OperationType::UpdateProfile.priority_level(), PriorityLevel::Low);
    }

    #[test]
    fn test_operation_type_from_str() {
        assert_eq!(
            "create_incident".parse::<OperationType>().unwrap(),
            OperationType::CreateIncident
        );
        assert_eq!(
            "Accept-Assignment".parse::<OperationType>().unwrap(),
            OperationType::AcceptAssignment
        );
        assert!("delete_everything".parse::<OperationType>().is_err());

        for t in OperationType::ALL {
            assert_eq!(t.as_str().parse::<OperationType>().unwrap(), t);
        }
    }

    #[test]
    fn test_payload_tagging() {
        let json = serde_json::to_value(incident()).unwrap();
        assert_eq!(json["type"], "create_incident");
        assert_eq!(json["payload"]["client_ref"], "local-1");
        assert_eq!(incident().operation_type(), OperationType::CreateIncident);
    }

    #[test]
    fn test_payload_from_json() {
        let payload = OperationPayload::from_json(
            OperationType::AcceptAssignment,
            json!({"assignment_id": "asg-9"}),
        )
        .unwrap();

        assert_eq!(payload.operation_type(), OperationType::AcceptAssignment);
        assert_eq!(payload.target_id(), Some("asg-9"));
    }

    #[test]
    fn test_payload_from_json_shape_mismatch() {
        let result = OperationPayload::from_json(OperationType::SendMessage, json!({"oops": 1}));
        assert!(matches!(result, Err(TetherError::Serialization(_))));
    }

    #[test]
    fn test_target_id() {
        assert_eq!(incident().target_id(), None);

        let patch = OperationPayload::UpdateIncident(RecordPatch {
            record_id: "inc-42".to_string(),
            changes: Map::new(),
        });
        assert_eq!(patch.target_id(), Some("inc-42"));
    }

    #[test]
    fn test_new_pending_operation() {
        let op = PendingOperation::new(incident(), 100);

        assert_eq!(op.retry_count, 0);
        assert!(op.last_attempt.is_none());
        assert!(op.error.is_none());
        assert!(uuid::Uuid::parse_str(&op.id).is_ok());
        assert!(!op.is_exhausted(3));

        let other = PendingOperation::new(incident(), 100);
        assert_ne!(op.id, other.id);
    }

    #[test]
    fn test_pending_operation_serialization() {
        let op = PendingOperation::new(incident(), 100);
        let json = serde_json::to_string(&op).unwrap();
        let back: PendingOperation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, op);
    }
}
