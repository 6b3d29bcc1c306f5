//! Task execution.

use std::sync::Arc;
use tracing::debug;

use crate::error::SchedulerError;
use crate::registry::{HandlerRegistry, RegisteredHandler};
use crate::task::TaskRecord;

/// Executes task invocations, normalizing async and blocking handlers
/// into one awaitable outcome.
///
/// Holds no per-call state and is safe to share across runners.
pub struct TaskExecutor {
    registry: Arc<HandlerRegistry>,
}

impl TaskExecutor {
    /// Create an executor resolving invocations through `registry`.
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    /// Execute a task's invocation.
    ///
    /// Async handlers are awaited on the caller's context; blocking
    /// handlers are dispatched to a blocking thread so they cannot stall
    /// other runners. Every failure, including an unresolvable handler
    /// name, surfaces as [`SchedulerError::ExecutionFailed`].
    pub async fn execute(&self, record: &TaskRecord) -> Result<(), SchedulerError> {
        let name = &record.invocation.handler;
        let handler = self.registry.try_resolve(name).map_err(|e| {
            SchedulerError::ExecutionFailed {
                task_id: record.id,
                reason: e.to_string(),
            }
        })?;

        let outcome = match handler {
            RegisteredHandler::Async(handler) => handler.call(&record.invocation.args).await,
            RegisteredHandler::Blocking(handler) => {
                let args = record.invocation.args.clone();
                match tokio::task::spawn_blocking(move || handler.call(&args)).await {
                    Ok(result) => result,
                    Err(e) => Err(e.to_string().into()),
                }
            }
        };

        match outcome {
            Ok(()) => {
                debug!("Task {} executed successfully", record.id);
                Ok(())
            }
            Err(e) => Err(SchedulerError::ExecutionFailed {
                task_id: record.id,
                reason: e.to_string(),
            }),
        }
    }
}
