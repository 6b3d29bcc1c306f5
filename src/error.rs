//! Scheduler errors.

use thiserror::Error;
use uuid::Uuid;

/// Scheduler error types.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The durable backend rejected or could not complete an operation.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A task invocation failed.
    #[error("Task {task_id} failed: {reason}")]
    ExecutionFailed {
        /// Id of the task whose invocation failed.
        task_id: Uuid,
        /// Failure description from the handler boundary.
        reason: String,
    },

    /// No handler registered under this name.
    #[error("No handler registered for '{0}'")]
    HandlerNotRegistered(String),

    /// A handler with this name is already registered.
    #[error("Handler already registered: {0}")]
    HandlerAlreadyRegistered(String),

    /// Record payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}
