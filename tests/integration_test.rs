//! End-to-end integration tests for the scheduler.
//!
//! These tests verify the complete flow from task registration through
//! execution, rescheduling, retirement, and shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tempfile::TempDir;

use taskwheel::{
    BoxError, Handler, HandlerRegistry, MemoryTaskStore, Scheduler, SqliteTaskStore, TaskRecord,
    TaskStore,
};

// ============================================================================
// Test Helpers
// ============================================================================

/// Test handler that tracks execution count.
struct CountingHandler {
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl Handler for CountingHandler {
    async fn call(&self, _args: &[serde_json::Value]) -> Result<(), BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Test handler that always fails.
struct FailingHandler;

#[async_trait]
impl Handler for FailingHandler {
    async fn call(&self, _args: &[serde_json::Value]) -> Result<(), BoxError> {
        Err("handler exploded".into())
    }
}

fn registry_with_counter() -> (Arc<HandlerRegistry>, Arc<AtomicU32>) {
    let calls = Arc::new(AtomicU32::new(0));
    let registry = Arc::new(HandlerRegistry::new());
    registry
        .register("count", Arc::new(CountingHandler { calls: calls.clone() }))
        .unwrap();
    (registry, calls)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(200)).await;
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn one_shot_past_due_executes_once_and_retires() {
    let (registry, calls) = registry_with_counter();
    let store = Arc::new(MemoryTaskStore::new());
    let scheduler = Scheduler::new(store.clone(), registry);

    let record = TaskRecord::new("count", vec![json!("now")], Utc::now() - chrono::Duration::seconds(1));
    let id = record.id;
    scheduler.add_task(record).await.unwrap();

    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(store.load(&id).await.unwrap().is_none());

    scheduler.stop().await;
}

#[tokio::test]
async fn recurring_task_advances_by_exact_interval() {
    let (registry, calls) = registry_with_counter();
    let store = Arc::new(MemoryTaskStore::new());
    let scheduler = Scheduler::new(store.clone(), registry);

    let record = TaskRecord::new("count", vec![], Utc::now()).with_interval(5);
    let id = record.id;
    let original_next_run = record.next_run;
    scheduler.add_task(record).await.unwrap();

    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Still present, advanced by exactly one interval from the previous
    // scheduled time rather than from the execution time.
    let stored = store.load(&id).await.unwrap().unwrap();
    assert_eq!(
        stored.next_run,
        original_next_run + chrono::Duration::seconds(5)
    );

    scheduler.stop().await;
}

#[tokio::test]
async fn missed_run_with_policy_false_is_skipped() {
    let (registry, calls) = registry_with_counter();
    let store = Arc::new(MemoryTaskStore::new());
    let scheduler = Scheduler::new(store.clone(), registry);

    let record = TaskRecord::new("count", vec![], Utc::now() - chrono::Duration::seconds(30))
        .with_run_missed(false);
    let id = record.id;
    let next_run = record.next_run;
    scheduler.add_task(record).await.unwrap();

    settle().await;
    // Never executed, and the record stays in the store untouched.
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    let stored = store.load(&id).await.unwrap().unwrap();
    assert_eq!(stored.next_run, next_run);
    assert_eq!(scheduler.runner_count().await, 0);

    scheduler.stop().await;
}

#[tokio::test]
async fn start_serves_prepopulated_store() {
    let (registry, calls) = registry_with_counter();
    let store = Arc::new(MemoryTaskStore::new());

    let first = TaskRecord::new("count", vec![], Utc::now());
    let second = TaskRecord::new("count", vec![], Utc::now() - chrono::Duration::seconds(2));
    store.save(&first).await.unwrap();
    store.save(&second).await.unwrap();

    let scheduler = Scheduler::new(store.clone(), registry);
    scheduler.start().await.unwrap();

    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(store.load_all().await.unwrap().is_empty());

    scheduler.stop().await;
}

#[tokio::test]
async fn stop_drains_waiting_runners_without_executing() {
    let (registry, calls) = registry_with_counter();
    let store = Arc::new(MemoryTaskStore::new());
    let scheduler = Scheduler::new(store.clone(), registry);

    let record = TaskRecord::new("count", vec![], Utc::now() + chrono::Duration::hours(1));
    let id = record.id;
    scheduler.add_task(record).await.unwrap();
    assert_eq!(scheduler.runner_count().await, 1);

    scheduler.stop().await;
    assert_eq!(scheduler.runner_count().await, 0);
    assert!(!scheduler.is_running());

    settle().await;
    // No execution happened and the record is still durable.
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(store.load(&id).await.unwrap().is_some());
}

#[tokio::test]
async fn restarted_scheduler_serves_tasks_again() {
    let (registry, calls) = registry_with_counter();
    let store = Arc::new(MemoryTaskStore::new());
    let scheduler = Scheduler::new(store.clone(), registry);

    scheduler.start().await.unwrap();
    scheduler.stop().await;

    // A record that became durable between the two runs.
    let record = TaskRecord::new("count", vec![], Utc::now());
    let id = record.id;
    store.save(&record).await.unwrap();

    // The same instance must come back up with working runners.
    scheduler.start().await.unwrap();
    assert!(scheduler.is_running());

    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(store.load(&id).await.unwrap().is_none());

    scheduler.stop().await;
}

#[tokio::test]
async fn add_after_stop_persists_but_never_executes() {
    let (registry, calls) = registry_with_counter();
    let store = Arc::new(MemoryTaskStore::new());
    let scheduler = Scheduler::new(store.clone(), registry);

    scheduler.stop().await;

    let record = TaskRecord::new("count", vec![], Utc::now() - chrono::Duration::seconds(1));
    let id = record.id;
    scheduler.add_task(record).await.unwrap();

    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    // The record stays durable for the next scheduler instance.
    assert!(store.load(&id).await.unwrap().is_some());
}

#[tokio::test]
async fn failed_execution_leaves_record_for_restart() {
    let calls = Arc::new(AtomicU32::new(0));
    let registry = Arc::new(HandlerRegistry::new());
    registry.register("fail", Arc::new(FailingHandler)).unwrap();
    registry
        .register("count", Arc::new(CountingHandler { calls: calls.clone() }))
        .unwrap();

    let store = Arc::new(MemoryTaskStore::new());
    let scheduler = Scheduler::new(store.clone(), registry);

    let record = TaskRecord::new("fail", vec![], Utc::now()).with_interval(5);
    let id = record.id;
    let next_run = record.next_run;
    scheduler.add_task(record).await.unwrap();

    settle().await;
    // Neither rescheduled nor deleted: the stale next_run is the
    // crash-recovery contract for the next process start.
    let stored = store.load(&id).await.unwrap().unwrap();
    assert_eq!(stored.next_run, next_run);
    assert_eq!(scheduler.runner_count().await, 0);

    scheduler.stop().await;
}

#[tokio::test]
async fn tasks_survive_process_restart() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("tasks.db");

    let id = {
        let (registry, _) = registry_with_counter();
        let store = Arc::new(SqliteTaskStore::open(&db_path).await.unwrap());
        let scheduler = Scheduler::new(store, registry);

        let record = TaskRecord::new("count", vec![], Utc::now() + chrono::Duration::hours(1));
        let id = record.id;
        scheduler.add_task(record).await.unwrap();
        scheduler.stop().await;
        id
    };

    // A fresh scheduler over the same database picks the task up.
    let (registry, _) = registry_with_counter();
    let store = Arc::new(SqliteTaskStore::open(&db_path).await.unwrap());
    let scheduler = Scheduler::new(store.clone(), registry);
    scheduler.start().await.unwrap();

    assert_eq!(scheduler.runner_count().await, 1);
    assert!(store.load(&id).await.unwrap().is_some());

    scheduler.stop().await;
}
