//! Offline mutation queue and sync coordination.
//!
//! Mutations made while offline are recorded as [`PendingOperation`]s in a
//! durable, priority-ordered [`OperationQueue`]. The [`SyncOrchestrator`]
//! drains the queue through a host-provided [`MutationExecutor`], either on
//! demand or from a recurring [`BackgroundScheduler`] task.

pub mod executor;
pub mod operation;
pub mod orchestrator;
pub mod queue;
pub mod result;
pub mod scheduler;

pub use executor::{ConnectivityFlag, ConnectivityProbe, MutationExecutor};
pub use operation::{
    AssignmentResponse, IncidentDraft, MessageDraft, OperationPayload, OperationType,
    OperationUpdate, PendingOperation, ProfilePatch, RecordPatch, SafetyPlanDraft, WellbeingEntry,
};
pub use orchestrator::{
    ListenerId, SyncOrchestrator, SyncState, SyncStatus, BACKGROUND_TASK_NAME, LAST_SYNC_KEY,
};
pub use queue::{OperationQueue, QueueStats, QUEUE_KEY};
pub use result::{SyncResult, SyncSummary};
pub use scheduler::{
    BackgroundFetchResult, BackgroundScheduler, BackgroundTask, InProcessScheduler,
    PlatformScheduler, PlatformTaskHost,
};
