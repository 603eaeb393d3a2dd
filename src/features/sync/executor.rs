//! Seams to the outside world: the remote mutation executor and the
//! connectivity probe.
//!
//! Both are owned by the host application. The engine only awaits them.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use super::operation::OperationPayload;
use crate::error::TetherError;

/// Applies queued mutations to the remote service.
#[async_trait]
pub trait MutationExecutor: Send + Sync {
    /// Apply one mutation remotely.
    ///
    /// # Errors
    ///
    /// Any error counts as a failed attempt and is retried on a later pass.
    async fn execute(&self, operation: &OperationPayload) -> Result<(), TetherError>;

    /// Resume mutations the host's request layer paused while offline.
    ///
    /// Called once at the start of every sync pass.
    ///
    /// # Errors
    ///
    /// Failures are logged and do not abort the pass.
    async fn resume_paused_mutations(&self) -> Result<(), TetherError> {
        Ok(())
    }
}

/// Reports whether the device can currently reach the remote service.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_connected(&self) -> bool;
}

/// Connectivity probe backed by a flag the host flips from platform callbacks.
#[derive(Debug)]
pub struct ConnectivityFlag {
    online: AtomicBool,
}

impl ConnectivityFlag {
    #[must_use]
    pub const fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }
}

impl Default for ConnectivityFlag {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl ConnectivityProbe for ConnectivityFlag {
    async fn is_connected(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }
}
