//! Engine features.
//!
//! - Offline operation queue and sync orchestration
//! - Conflict resolution

pub mod conflict;
pub mod sync;
