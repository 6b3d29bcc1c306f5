//! Handler registry.
//!
//! Tasks persist only a handler name and argument values; the registry maps
//! those names back to runnable code in the current process. This keeps the
//! stored payload portable across restarts.

use async_trait::async_trait;
use dashmap::{DashMap, Entry};
use std::sync::Arc;

use crate::error::SchedulerError;

/// Boxed error returned from task handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Async-native task handler.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Run the handler with the task's arguments.
    async fn call(&self, args: &[serde_json::Value]) -> Result<(), BoxError>;
}

/// Blocking task handler.
///
/// Implementations may block the calling thread; the executor dispatches
/// them to a dedicated blocking thread so runners are never stalled.
pub trait BlockingHandler: Send + Sync {
    /// Run the handler with the task's arguments.
    fn call(&self, args: &[serde_json::Value]) -> Result<(), BoxError>;
}

/// A registered handler of either kind.
#[derive(Clone)]
pub enum RegisteredHandler {
    /// Awaited directly on the runner's context.
    Async(Arc<dyn Handler>),
    /// Dispatched to a blocking thread and awaited.
    Blocking(Arc<dyn BlockingHandler>),
}

/// Registry mapping handler names to implementations.
pub struct HandlerRegistry {
    handlers: DashMap<String, RegisteredHandler>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    /// Register an async handler.
    ///
    /// Returns an error if a handler with the same name is already registered.
    pub fn register(
        &self,
        name: impl Into<String>,
        handler: Arc<dyn Handler>,
    ) -> Result<(), SchedulerError> {
        self.insert(name.into(), RegisteredHandler::Async(handler))
    }

    /// Register a blocking handler.
    ///
    /// Returns an error if a handler with the same name is already registered.
    pub fn register_blocking(
        &self,
        name: impl Into<String>,
        handler: Arc<dyn BlockingHandler>,
    ) -> Result<(), SchedulerError> {
        self.insert(name.into(), RegisteredHandler::Blocking(handler))
    }

    fn insert(&self, name: String, handler: RegisteredHandler) -> Result<(), SchedulerError> {
        // Entry-based insert so two concurrent registrations of the same
        // name cannot both succeed.
        match self.handlers.entry(name) {
            Entry::Occupied(entry) => {
                Err(SchedulerError::HandlerAlreadyRegistered(entry.key().clone()))
            }
            Entry::Vacant(entry) => {
                entry.insert(handler);
                Ok(())
            }
        }
    }

    /// Resolve a handler by name.
    pub fn resolve(&self, name: &str) -> Option<RegisteredHandler> {
        self.handlers.get(name).map(|entry| entry.clone())
    }

    /// Resolve a handler by name, failing if none is registered.
    pub fn try_resolve(&self, name: &str) -> Result<RegisteredHandler, SchedulerError> {
        self.resolve(name)
            .ok_or_else(|| SchedulerError::HandlerNotRegistered(name.to_string()))
    }

    /// Check if a handler with the given name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// List all registered handler names.
    pub fn list_names(&self) -> Vec<String> {
        self.handlers.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Get the number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
