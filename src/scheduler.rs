//! Scheduler orchestration and per-task runners.
//!
//! The scheduler owns one long-lived tokio task per active record. A runner
//! waits until its record is due, executes it, then either reschedules the
//! record (recurring) or retires it (one-shot). The loop is intrinsic to the
//! runner, so concurrency stays bounded to one live runner per record.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::executor::TaskExecutor;
use crate::registry::HandlerRegistry;
use crate::store::{SqliteTaskStore, TaskStore};
use crate::task::TaskRecord;

/// Live-runner registry shared between the scheduler and its runners.
type RunnerMap = Arc<Mutex<HashMap<Uuid, JoinHandle<()>>>>;

/// Orchestrates task scheduling, execution, and persistence.
pub struct Scheduler {
    store: Arc<dyn TaskStore>,
    executor: Arc<TaskExecutor>,
    runners: RunnerMap,
    /// Shutdown signal for the current run; replaced on restart.
    shutdown: Mutex<CancellationToken>,
    running: AtomicBool,
}

impl Scheduler {
    /// Create a scheduler over an explicit store and handler registry.
    pub fn new(store: Arc<dyn TaskStore>, registry: Arc<HandlerRegistry>) -> Self {
        Self {
            store,
            executor: Arc::new(TaskExecutor::new(registry)),
            runners: Arc::new(Mutex::new(HashMap::new())),
            shutdown: Mutex::new(CancellationToken::new()),
            running: AtomicBool::new(false),
        }
    }

    /// Create a scheduler with a SQLite store from configuration.
    pub async fn from_config(
        config: &SchedulerConfig,
        registry: Arc<HandlerRegistry>,
    ) -> Result<Self, SchedulerError> {
        let store: Arc<dyn TaskStore> = match &config.db_path {
            Some(path) => Arc::new(SqliteTaskStore::open(path).await?),
            None => Arc::new(SqliteTaskStore::in_memory().await?),
        };
        Ok(Self::new(store, registry))
    }

    /// Check if the scheduler has been started and not yet stopped.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of live runners.
    pub async fn runner_count(&self) -> usize {
        self.runners.lock().await.len()
    }

    /// Start serving persisted tasks.
    ///
    /// Loads every record from the store and spawns one runner per record.
    /// A storage failure here is fatal: the error is propagated and no
    /// runners are started.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("Scheduler already running");
            return Ok(());
        }

        // A previous stop() cancelled the shutdown token; runners spawned
        // from here on need a fresh one or they would exit immediately.
        {
            let mut shutdown = self.shutdown.lock().await;
            if shutdown.is_cancelled() {
                *shutdown = CancellationToken::new();
            }
        }

        let records = match self.store.load_all().await {
            Ok(records) => records,
            Err(e) => {
                error!("Failed to start scheduler: {e}");
                self.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        info!("Scheduler started with {} tasks", records.len());
        for record in records {
            self.spawn_runner(record).await;
        }
        Ok(())
    }

    /// Register a new task and begin running it immediately.
    ///
    /// The record is made durable before any execution is attempted; if the
    /// save fails no runner is spawned.
    pub async fn add_task(&self, record: TaskRecord) -> Result<(), SchedulerError> {
        self.store.save(&record).await?;
        debug!("Task {} saved, spawning runner", record.id);
        self.spawn_runner(record).await;
        Ok(())
    }

    /// Stop the scheduler and drain all runners.
    ///
    /// Cancellation is cooperative: runners that are waiting abort without
    /// executing, while runners mid-execution finish that execution and its
    /// persistence step before exiting. Returns once every runner is done.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        info!("Scheduler stopping");
        self.shutdown.lock().await.cancel();

        let handles: Vec<(Uuid, JoinHandle<()>)> = {
            let mut runners = self.runners.lock().await;
            runners.drain().collect()
        };

        for (id, handle) in handles {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!("Runner for task {id} ended abnormally: {e}");
                }
            }
        }
        info!("Scheduler stopped");
    }

    async fn spawn_runner(&self, record: TaskRecord) {
        let id = record.id;
        let shutdown = self.shutdown.lock().await.clone();
        // Hold the registry lock across spawn + insert so a runner that
        // exits immediately cannot remove its entry before it is inserted.
        let mut runners = self.runners.lock().await;
        let handle = tokio::spawn(run_task(
            record,
            self.store.clone(),
            self.executor.clone(),
            self.runners.clone(),
            shutdown,
        ));
        runners.insert(id, handle);
    }
}

/// Per-task runner loop.
///
/// Waits until the record is due, executes it, persists the reschedule or
/// retirement decision, then re-waits. Failures terminate the runner and
/// leave the record in the store with its current `next_run`, so it is
/// picked up unchanged on the next process start.
async fn run_task(
    mut record: TaskRecord,
    store: Arc<dyn TaskStore>,
    executor: Arc<TaskExecutor>,
    runners: RunnerMap,
    shutdown: CancellationToken,
) {
    let id = record.id;

    loop {
        if shutdown.is_cancelled() {
            debug!("Runner for task {id} cancelled");
            break;
        }

        let now = Utc::now();
        if record.next_run > now {
            let pause = (record.next_run - now).to_std().unwrap_or_default();
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Runner for task {id} cancelled while waiting");
                    break;
                }
                _ = tokio::time::sleep(pause) => {}
            }
        } else if !record.run_missed {
            // The record stays in the store untouched; it will be
            // re-evaluated on the next process start.
            warn!("Task {id} missed its run and will not execute");
            break;
        }

        if let Err(e) = executor.execute(&record).await {
            error!("Task {id} failed: {e}");
            break;
        }

        if record.schedule_next_run() {
            if let Err(e) = store.update(&record).await {
                error!("Failed to persist reschedule for task {id}: {e}");
                break;
            }
            debug!("Task {id} rescheduled for {}", record.next_run);
            continue;
        }

        if let Err(e) = store.delete(&id).await {
            error!("Failed to remove completed task {id}: {e}");
        } else {
            debug!("Task {id} completed and removed from storage");
        }
        break;
    }

    runners.lock().await.remove(&id);
}
