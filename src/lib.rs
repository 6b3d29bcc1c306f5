//! # Taskwheel
//!
//! Persistent recurring-task scheduler.
//!
//! ## Features
//!
//! - One lightweight runner per active task (tokio)
//! - Durable task persistence (SQLite)
//! - Recurring and one-shot tasks with fixed-cadence rescheduling
//! - Handler registry resolving stable names to runnable code
//! - Cooperative shutdown that drains in-flight executions

pub mod config;
pub mod error;
pub mod executor;
pub mod registry;
pub mod scheduler;
pub mod store;
pub mod task;

pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use executor::TaskExecutor;
pub use registry::{BlockingHandler, BoxError, Handler, HandlerRegistry};
pub use scheduler::Scheduler;
pub use store::{MemoryTaskStore, SqliteTaskStore, TaskStore};
pub use task::{Invocation, TaskRecord};
