//! Background task scheduling.
//!
//! Two implementations of [`BackgroundScheduler`]:
//! - [`InProcessScheduler`] drives tasks from a tokio interval. Used where the
//!   platform has no native background execution, and in tests.
//! - [`PlatformScheduler`] hands registration to the host OS (via
//!   [`PlatformTaskHost`]); the host calls [`PlatformScheduler::run`] when the
//!   OS wakes the app.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::BoxFuture;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::TetherError;

/// Outcome reported to the platform after a background run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundFetchResult {
    /// Work was done.
    NewData,
    /// Nothing to do, or offline.
    NoData,
    /// The run failed.
    Failed,
}

/// Body of a recurring background task.
pub type BackgroundTask = Arc<dyn Fn() -> BoxFuture<'static, BackgroundFetchResult> + Send + Sync>;

/// Registers recurring background tasks.
pub trait BackgroundScheduler: Send + Sync {
    /// Register `task` to run every `interval`, replacing a task of the same name.
    ///
    /// # Errors
    ///
    /// Returns `TetherError::Scheduler` if the task cannot be registered.
    fn register(&self, name: &str, interval: Duration, task: BackgroundTask) -> Result<(), TetherError>;

    /// Stop a task. Unregistering an unknown name succeeds.
    ///
    /// # Errors
    ///
    /// Returns `TetherError::Scheduler` if the platform refuses.
    fn unregister(&self, name: &str) -> Result<(), TetherError>;

    /// Whether a task of this name is registered.
    fn is_registered(&self, name: &str) -> bool;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scheduler backed by tokio timers in the current process.
#[derive(Default)]
pub struct InProcessScheduler {
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl InProcessScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl BackgroundScheduler for InProcessScheduler {
    fn register(&self, name: &str, interval: Duration, task: BackgroundTask) -> Result<(), TetherError> {
        if interval.is_zero() {
            return Err(TetherError::Scheduler("Interval must be positive".to_string()));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TetherError::Scheduler(format!("No tokio runtime: {e}")))?;

        let task_name = name.to_string();
        let handle = runtime.spawn(async move {
            // First run happens one interval after registration
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let outcome = task().await;
                debug!(task = %task_name, ?outcome, "Background task finished");
            }
        });

        if let Some(previous) = lock(&self.tasks).insert(name.to_string(), handle) {
            previous.abort();
        }
        info!(task = name, interval_secs = interval.as_secs(), "Registered in-process background task");
        Ok(())
    }

    fn unregister(&self, name: &str) -> Result<(), TetherError> {
        if let Some(handle) = lock(&self.tasks).remove(name) {
            handle.abort();
            info!(task = name, "Unregistered in-process background task");
        }
        Ok(())
    }

    fn is_registered(&self, name: &str) -> bool {
        lock(&self.tasks).contains_key(name)
    }
}

impl Drop for InProcessScheduler {
    fn drop(&mut self) {
        for (_, handle) in lock(&self.tasks).drain() {
            handle.abort();
        }
    }
}

/// Native periodic-task facility of the host platform.
pub trait PlatformTaskHost: Send + Sync {
    /// Ask the OS to wake the app for `name` at most every `minimum_interval`.
    ///
    /// # Errors
    ///
    /// Returns a description of why the OS refused.
    fn schedule_periodic(&self, name: &str, minimum_interval: Duration) -> Result<(), String>;

    /// Withdraw a previously scheduled task.
    ///
    /// # Errors
    ///
    /// Returns a description of why the OS refused.
    fn cancel(&self, name: &str) -> Result<(), String>;
}

/// Scheduler that delegates timing to the host platform.
pub struct PlatformScheduler {
    host: Arc<dyn PlatformTaskHost>,
    tasks: Mutex<HashMap<String, BackgroundTask>>,
}

impl PlatformScheduler {
    #[must_use]
    pub fn new(host: Arc<dyn PlatformTaskHost>) -> Self {
        Self {
            host,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Run a registered task; called by the host when the OS fires it.
    pub async fn run(&self, name: &str) -> BackgroundFetchResult {
        let task = lock(&self.tasks).get(name).cloned();
        match task {
            Some(task) => task().await,
            None => {
                warn!(task = name, "OS fired an unregistered background task");
                BackgroundFetchResult::NoData
            },
        }
    }
}

impl BackgroundScheduler for PlatformScheduler {
    fn register(&self, name: &str, interval: Duration, task: BackgroundTask) -> Result<(), TetherError> {
        self.host
            .schedule_periodic(name, interval)
            .map_err(|e| TetherError::Scheduler(format!("Platform refused task {name}: {e}")))?;
        lock(&self.tasks).insert(name.to_string(), task);
        info!(task = name, interval_secs = interval.as_secs(), "Registered platform background task");
        Ok(())
    }

    fn unregister(&self, name: &str) -> Result<(), TetherError> {
        if lock(&self.tasks).remove(name).is_some() {
            self.host
                .cancel(name)
                .map_err(|e| TetherError::Scheduler(format!("Platform refused to cancel {name}: {e}")))?;
            info!(task = name, "Unregistered platform background task");
        }
        Ok(())
    }

    fn is_registered(&self, name: &str) -> bool {
        lock(&self.tasks).contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_task(counter: Arc<AtomicUsize>) -> BackgroundTask {
        Arc::new(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                BackgroundFetchResult::NewData
            }
            .boxed()
        })
    }

    #[derive(Default)]
    struct RecordingHost {
        scheduled: Mutex<Vec<(String, Duration)>>,
        cancelled: Mutex<Vec<String>>,
        refuse: bool,
    }

    impl PlatformTaskHost for RecordingHost {
        fn schedule_periodic(&self, name: &str, minimum_interval: Duration) -> Result<(), String> {
            if self.refuse {
                return Err("background refresh disabled by user".to_string());
            }
            lock(&self.scheduled).push((name.to_string(), minimum_interval));
            Ok(())
        }

        fn cancel(&self, name: &str) -> Result<(), String> {
            lock(&self.cancelled).push(name.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_in_process_scheduler_runs_and_stops() {
        let scheduler = InProcessScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));

        scheduler
            .register("sync", Duration::from_millis(20), counting_task(counter.clone()))
            .unwrap();
        assert!(scheduler.is_registered("sync"));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(counter.load(Ordering::SeqCst) >= 2);

        scheduler.unregister("sync").unwrap();
        assert!(!scheduler.is_registered("sync"));
        tokio::task::yield_now().await;

        let after_stop = counter.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(counter.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test]
    async fn test_in_process_scheduler_rejects_zero_interval() {
        let scheduler = InProcessScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let result = scheduler.register("sync", Duration::ZERO, counting_task(counter));
        assert!(matches!(result, Err(TetherError::Scheduler(_))));
    }

    #[test]
    fn test_in_process_scheduler_requires_runtime() {
        let scheduler = InProcessScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let result = scheduler.register("sync", Duration::from_secs(1), counting_task(counter));
        assert!(matches!(result, Err(TetherError::Scheduler(_))));
    }

    #[tokio::test]
    async fn test_platform_scheduler_delegates_to_host() {
        let host = Arc::new(RecordingHost::default());
        let scheduler = PlatformScheduler::new(host.clone());
        let counter = Arc::new(AtomicUsize::new(0));

        scheduler
            .register("sync", Duration::from_secs(900), counting_task(counter.clone()))
            .unwrap();
        assert_eq!(
            *lock(&host.scheduled),
            vec![("sync".to_string(), Duration::from_secs(900))]
        );

        assert_eq!(scheduler.run("sync").await, BackgroundFetchResult::NewData);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        scheduler.unregister("sync").unwrap();
        scheduler.unregister("sync").unwrap();
        assert_eq!(*lock(&host.cancelled), vec!["sync".to_string()]);
        assert_eq!(scheduler.run("sync").await, BackgroundFetchResult::NoData);
    }

    #[test]
    fn test_platform_scheduler_surfaces_refusal() {
        let host = Arc::new(RecordingHost {
            refuse: true,
            ..RecordingHost::default()
        });
        let scheduler = PlatformScheduler::new(host);
        let counter = Arc::new(AtomicUsize::new(0));

        let result = scheduler.register("sync", Duration::from_secs(900), counting_task(counter));
        assert!(matches!(result, Err(TetherError::Scheduler(_))));
        assert!(!scheduler.is_registered("sync"));
    }
}
