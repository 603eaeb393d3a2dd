//! Sync pass coordination.
//!
//! The orchestrator is either Idle or Syncing. A pass drains the retryable
//! operations of the queue through the bound [`MutationExecutor`], one at a
//! time in priority order. A pass requested while another is running is
//! rejected with an empty result.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::executor::{ConnectivityProbe, MutationExecutor};
use super::operation::PendingOperation;
use super::queue::OperationQueue;
use super::result::{SyncResult, SyncSummary};
use super::scheduler::{BackgroundFetchResult, BackgroundScheduler, BackgroundTask};
use crate::config::{Config, Feature};
use crate::error::TetherError;
use crate::storage::SecureStore;

/// Storage key holding the time of the last attempted pass.
pub const LAST_SYNC_KEY: &str = "last_sync_time";

/// Name under which the recurring sync task is registered.
pub const BACKGROUND_TASK_NAME: &str = "tether-background-sync";

/// Orchestrator state reported to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    Syncing,
}

/// Handle returned by [`SyncOrchestrator::on_sync_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type SyncListener = Arc<dyn Fn(SyncState) + Send + Sync>;

/// Snapshot of the sync state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub is_syncing: bool,
    /// Operations still eligible for automatic retry
    pub pending_count: usize,
    pub last_sync_time: Option<DateTime<Utc>>,
}

/// Coordinates sync passes over the operation queue.
pub struct SyncOrchestrator {
    queue: Arc<OperationQueue>,
    store: Arc<SecureStore>,
    config: Arc<Config>,
    connectivity: Arc<dyn ConnectivityProbe>,
    scheduler: Arc<dyn BackgroundScheduler>,
    executor: RwLock<Option<Arc<dyn MutationExecutor>>>,
    syncing: AtomicBool,
    background_registered: AtomicBool,
    listeners: Mutex<Vec<(ListenerId, SyncListener)>>,
    next_listener_id: AtomicU64,
}

/// Returns the orchestrator to Idle when a pass ends, however it ends.
struct PassGuard<'a> {
    orchestrator: &'a SyncOrchestrator,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.orchestrator.syncing.store(false, Ordering::Release);
        self.orchestrator.notify(SyncState::Idle);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SyncOrchestrator {
    #[must_use]
    pub fn new(
        queue: Arc<OperationQueue>,
        store: Arc<SecureStore>,
        config: Arc<Config>,
        connectivity: Arc<dyn ConnectivityProbe>,
        scheduler: Arc<dyn BackgroundScheduler>,
    ) -> Self {
        Self {
            queue,
            store,
            config,
            connectivity,
            scheduler,
            executor: RwLock::new(None),
            syncing: AtomicBool::new(false),
            background_registered: AtomicBool::new(false),
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(0),
        }
    }

    /// Bind the executor that applies mutations remotely.
    ///
    /// Binding again replaces the previous executor.
    pub fn initialize(&self, executor: Arc<dyn MutationExecutor>) {
        *self.executor.write().unwrap_or_else(PoisonError::into_inner) = Some(executor);
        debug!("Mutation executor bound");
    }

    fn executor(&self) -> Option<Arc<dyn MutationExecutor>> {
        self.executor
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    /// Register the recurring background sync task.
    ///
    /// Returns `false` without registering when background sync is disabled.
    /// Registering twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `TetherError::Scheduler` if the scheduler refuses the task.
    pub fn register_background_sync(self: &Arc<Self>) -> Result<bool, TetherError> {
        if !self.config.is_enabled(Feature::BackgroundSync) {
            info!("Background sync disabled in config");
            return Ok(false);
        }
        if self
            .background_registered
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(true);
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        let task: BackgroundTask = Arc::new(move || {
            let weak = weak.clone();
            async move {
                match weak.upgrade() {
                    Some(orchestrator) => orchestrator.run_background_task().await,
                    None => BackgroundFetchResult::NoData,
                }
            }
            .boxed()
        });

        if let Err(e) = self
            .scheduler
            .register(BACKGROUND_TASK_NAME, self.config.background_interval(), task)
        {
            self.background_registered.store(false, Ordering::Release);
            return Err(e);
        }
        Ok(true)
    }

    /// Stop the recurring background sync task. Safe to call when not registered.
    ///
    /// # Errors
    ///
    /// Returns `TetherError::Scheduler` if the scheduler refuses.
    pub fn unregister_background_sync(&self) -> Result<(), TetherError> {
        if self.background_registered.swap(false, Ordering::AcqRel) {
            self.scheduler.unregister(BACKGROUND_TASK_NAME)?;
        }
        Ok(())
    }

    /// Body of the background task: sync if online, otherwise do nothing.
    pub async fn run_background_task(&self) -> BackgroundFetchResult {
        if !self.connectivity.is_connected().await {
            debug!("Background sync skipped, offline");
            return BackgroundFetchResult::NoData;
        }

        match self.perform_sync().await {
            Ok(results) if results.is_empty() => BackgroundFetchResult::NoData,
            Ok(_) => BackgroundFetchResult::NewData,
            Err(e) => {
                error!("Background sync failed: {e}");
                BackgroundFetchResult::Failed
            },
        }
    }

    /// User-initiated sync.
    ///
    /// # Errors
    ///
    /// Returns `TetherError::NoConnection` when offline, otherwise whatever
    /// [`SyncOrchestrator::perform_sync`] returns.
    pub async fn manual_sync(&self) -> Result<Vec<SyncResult>, TetherError> {
        if !self.connectivity.is_connected().await {
            return Err(TetherError::NoConnection);
        }
        self.perform_sync().await
    }

    /// Run one sync pass over the currently retryable operations.
    ///
    /// Remote failures are recorded on the operation and reported in the
    /// results; they are not returned as errors.
    ///
    /// # Errors
    ///
    /// Returns `TetherError::NotInitialized` if no executor is bound, or a
    /// storage error if the queue cannot be updated.
    pub async fn perform_sync(&self) -> Result<Vec<SyncResult>, TetherError> {
        if self.is_syncing() {
            debug!("Sync already in progress");
            return Ok(Vec::new());
        }
        let executor = self
            .executor()
            .ok_or_else(|| TetherError::NotInitialized("No mutation executor bound".to_string()))?;
        if self
            .syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Sync already in progress");
            return Ok(Vec::new());
        }

        let _guard = PassGuard { orchestrator: self };
        self.notify(SyncState::Syncing);

        let outcome = self.run_pass(executor.as_ref()).await;
        self.record_last_sync();

        if let Ok(results) = &outcome {
            info!("Sync pass finished: {}", SyncSummary::from_results(results));
        }
        outcome
    }

    async fn run_pass(&self, executor: &dyn MutationExecutor) -> Result<Vec<SyncResult>, TetherError> {
        if let Err(e) = executor.resume_paused_mutations().await {
            warn!("Failed to resume paused mutations: {e}");
        }

        let operations = self.queue.select_retryable();
        info!(count = operations.len(), "Starting sync pass");

        let mut results = Vec::with_capacity(operations.len());
        for operation in operations {
            results.push(self.execute_one(executor, &operation).await?);
        }
        Ok(results)
    }

    async fn execute_one(
        &self,
        executor: &dyn MutationExecutor,
        operation: &PendingOperation,
    ) -> Result<SyncResult, TetherError> {
        let timeout = self.config.execution_timeout();
        let attempt = tokio::time::timeout(timeout, executor.execute(&operation.operation))
            .await
            .unwrap_or_else(|_| Err(TetherError::Timeout(timeout)));

        match attempt {
            Ok(()) => {
                self.queue.remove(&operation.id)?;
                debug!(
                    id = %operation.id,
                    operation_type = operation.operation_type().as_str(),
                    "Operation synced"
                );
                Ok(SyncResult::success(operation))
            },
            Err(e) => {
                if e.is_retryable() {
                    warn!(id = %operation.id, "Operation failed, will retry: {e}");
                } else {
                    error!(id = %operation.id, "Operation rejected: {e}");
                }
                let reason = e.to_string();
                self.queue.record_retry_failure(&operation.id, &reason)?;
                Ok(SyncResult::failure(operation, reason))
            },
        }
    }

    fn record_last_sync(&self) {
        if let Err(e) = self.store.set_item(LAST_SYNC_KEY, &Utc::now().to_rfc3339()) {
            warn!("Failed to persist last sync time: {e}");
        }
    }

    /// Time of the last attempted pass, if any.
    #[must_use]
    pub fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        let raw = self.store.get_item(LAST_SYNC_KEY)?;
        match DateTime::parse_from_rfc3339(&raw) {
            Ok(time) => Some(time.with_timezone(&Utc)),
            Err(e) => {
                warn!("Ignoring unreadable last sync time {raw:?}: {e}");
                None
            },
        }
    }

    #[must_use]
    pub fn sync_status(&self) -> SyncStatus {
        SyncStatus {
            is_syncing: self.is_syncing(),
            pending_count: self.queue.pending_count(),
            last_sync_time: self.last_sync_time(),
        }
    }

    /// Subscribe to Idle/Syncing transitions.
    ///
    /// Listeners run synchronously on the syncing task and must return quickly.
    pub fn on_sync_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(SyncState) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.listeners).push((id, Arc::new(listener)));
        id
    }

    /// Unsubscribe. Returns `false` if the id was not registered.
    pub fn remove_sync_listener(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    fn notify(&self, state: SyncState) {
        // Listeners may subscribe or unsubscribe from inside the callback
        let listeners: Vec<SyncListener> = lock(&self.listeners)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(state);
        }
    }
}
