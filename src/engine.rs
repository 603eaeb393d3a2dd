//! Composition root.
//!
//! [`SyncEngine`] owns one instance of every service and wires them
//! together. Hosts construct it once at start-up and hand out the parts.

use std::path::Path;
use std::sync::Arc;

use crate::config::{Config, Paths};
use crate::error::TetherError;
use crate::features::conflict::ConflictResolver;
use crate::features::sync::{
    BackgroundScheduler, ConnectivityFlag, ConnectivityProbe, InProcessScheduler, OperationPayload,
    OperationQueue, PendingOperation, SyncOrchestrator,
};
use crate::storage::{Database, KeyValueBackend, MemoryBackend, SecureStore, SqliteBackend};

/// The sync engine and its services.
pub struct SyncEngine {
    config: Arc<Config>,
    store: Arc<SecureStore>,
    queue: Arc<OperationQueue>,
    resolver: ConflictResolver,
    orchestrator: Arc<SyncOrchestrator>,
}

impl SyncEngine {
    /// Wire the services over an arbitrary backend.
    #[must_use]
    pub fn new(
        config: Config,
        backend: Arc<dyn KeyValueBackend>,
        connectivity: Arc<dyn ConnectivityProbe>,
        scheduler: Arc<dyn BackgroundScheduler>,
    ) -> Self {
        let config = Arc::new(config);
        let store = Arc::new(SecureStore::new(backend, &config));
        let queue = Arc::new(OperationQueue::new(store.clone(), config.clone()));
        let resolver = ConflictResolver::new(&config);
        let orchestrator = Arc::new(SyncOrchestrator::new(
            queue.clone(),
            store.clone(),
            config.clone(),
            connectivity,
            scheduler,
        ));

        Self {
            config,
            store,
            queue,
            resolver,
            orchestrator,
        }
    }

    /// Open an engine persisted in the `SQLite` database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(
        path: &Path,
        config: Config,
        connectivity: Arc<dyn ConnectivityProbe>,
        scheduler: Arc<dyn BackgroundScheduler>,
    ) -> Result<Self, TetherError> {
        let backend = SqliteBackend::with_database(Database::open_at(path)?);
        Ok(Self::new(config, Arc::new(backend), connectivity, scheduler))
    }

    /// Open an engine at the default location (`~/.tether/`), using the user
    /// config override if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory or database cannot be created.
    pub fn open_default(
        connectivity: Arc<dyn ConnectivityProbe>,
        scheduler: Arc<dyn BackgroundScheduler>,
    ) -> Result<Self, TetherError> {
        let paths = Paths::new()?;
        paths.ensure_dirs()?;
        let config = Config::load_from_path(&paths.config_file);
        Self::open_at(&paths.database, config, connectivity, scheduler)
    }

    /// Non-persistent engine, always online, with an in-process scheduler.
    #[must_use]
    pub fn in_memory(config: Config) -> Self {
        Self::new(
            config,
            Arc::new(MemoryBackend::new()),
            Arc::new(ConnectivityFlag::default()),
            Arc::new(InProcessScheduler::new()),
        )
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub const fn store(&self) -> &Arc<SecureStore> {
        &self.store
    }

    #[must_use]
    pub const fn queue(&self) -> &Arc<OperationQueue> {
        &self.queue
    }

    #[must_use]
    pub const fn resolver(&self) -> &ConflictResolver {
        &self.resolver
    }

    #[must_use]
    pub const fn orchestrator(&self) -> &Arc<SyncOrchestrator> {
        &self.orchestrator
    }

    /// Record a mutation for later delivery.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be persisted.
    pub fn enqueue(&self, payload: OperationPayload) -> Result<PendingOperation, TetherError> {
        self.queue.enqueue(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::sync::{MessageDraft, MutationExecutor, OperationType};
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct AcceptAll;

    #[async_trait]
    impl MutationExecutor for AcceptAll {
        async fn execute(&self, _operation: &OperationPayload) -> Result<(), TetherError> {
            Ok(())
        }
    }

    fn message() -> OperationPayload {
        OperationPayload::SendMessage(MessageDraft {
            thread_id: "thread-3".to_string(),
            body: "Running late, be there at 4".to_string(),
        })
    }

    #[test]
    fn test_queue_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tether.db");

        let queued = {
            let engine = SyncEngine::open_at(
                &path,
                Config::default(),
                Arc::new(ConnectivityFlag::default()),
                Arc::new(InProcessScheduler::new()),
            )
            .unwrap();
            engine.enqueue(message()).unwrap()
        };

        let engine = SyncEngine::open_at(
            &path,
            Config::default(),
            Arc::new(ConnectivityFlag::default()),
            Arc::new(InProcessScheduler::new()),
        )
        .unwrap();
        let reloaded = engine.queue().get(&queued.id).unwrap();
        assert_eq!(reloaded, queued);
        assert_eq!(reloaded.operation_type(), OperationType::SendMessage);
    }

    #[tokio::test]
    async fn test_in_memory_engine_syncs() {
        let engine = SyncEngine::in_memory(Config::default());
        engine.orchestrator().initialize(Arc::new(AcceptAll));
        engine.enqueue(message()).unwrap();

        let results = engine.orchestrator().manual_sync().await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(engine.queue().pending_count(), 0);
        assert!(engine.orchestrator().last_sync_time().is_some());
    }

    #[test]
    fn test_resolver_follows_config() {
        let mut config = Config::default();
        config.features.conflict_resolution = false;
        let engine = SyncEngine::in_memory(config);

        assert!(!engine.resolver().is_enabled());
        assert!(!engine.config().features.conflict_resolution);
    }
}
