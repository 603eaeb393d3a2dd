//! tether - offline-first sync engine
//!
//! This crate provides a durable, priority-ordered queue of pending remote
//! mutations, a sync orchestrator that drains it with bounded retries, and
//! conflict resolution for local/server record pairs. A small CLI inspects
//! and maintains the queue.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod output;
pub mod storage;

pub use cli::args::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use engine::SyncEngine;
pub use error::TetherError;
pub use features::conflict::{Conflict, ConflictResolver, ConflictStrategy};
pub use features::sync::{
    MutationExecutor, OperationPayload, OperationQueue, OperationType, PendingOperation,
    SyncOrchestrator, SyncResult,
};
