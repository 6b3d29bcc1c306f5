//! Task record definition and serialization.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SchedulerError;

/// Reference to work to perform: a registered handler name plus its arguments.
///
/// Only the name and argument values are persisted, so a record can be
/// reloaded and resolved in a fresh process through the handler registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invocation {
    /// Name of the registered handler.
    pub handler: String,
    /// Ordered arguments passed to the handler.
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
}

/// A schedulable unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Unique task ID; primary key in the store.
    pub id: Uuid,
    /// Work to perform when the task is due.
    pub invocation: Invocation,
    /// Absolute time at which the task becomes due.
    pub next_run: DateTime<Utc>,
    /// Repeat interval in seconds (None = one-shot).
    pub interval_secs: Option<u64>,
    /// Whether to execute anyway when the due time has already elapsed.
    #[serde(default = "default_run_missed")]
    pub run_missed: bool,
}

fn default_run_missed() -> bool {
    true
}

impl TaskRecord {
    /// Create a new one-shot task due at `next_run`.
    pub fn new(
        handler: impl Into<String>,
        args: Vec<serde_json::Value>,
        next_run: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            invocation: Invocation {
                handler: handler.into(),
                args,
            },
            next_run,
            interval_secs: None,
            run_missed: default_run_missed(),
        }
    }

    /// Set an explicit task ID.
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Set a repeat interval in seconds, making the task recurring.
    pub fn with_interval(mut self, secs: u64) -> Self {
        self.interval_secs = Some(secs);
        self
    }

    /// Set the missed-run policy.
    pub fn with_run_missed(mut self, run_missed: bool) -> Self {
        self.run_missed = run_missed;
        self
    }

    /// Check if the task repeats.
    pub fn is_recurring(&self) -> bool {
        self.interval_secs.is_some_and(|secs| secs > 0)
    }

    /// Advance `next_run` by one interval if the task is recurring.
    ///
    /// The advance is fixed-cadence: one full interval is added to the
    /// previous scheduled time, so delayed runs do not drift-correct
    /// against the wall clock. Returns true if the task was rescheduled.
    pub fn schedule_next_run(&mut self) -> bool {
        match self.interval_secs {
            Some(secs) if secs > 0 => {
                self.next_run += Duration::seconds(secs as i64);
                true
            }
            _ => false,
        }
    }

    /// Serialize the record to an opaque payload for storage.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SchedulerError> {
        serde_json::to_vec(self).map_err(|e| SchedulerError::Serialization(e.to_string()))
    }

    /// Deserialize a record from a stored payload.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SchedulerError> {
        serde_json::from_slice(bytes).map_err(|e| SchedulerError::Serialization(e.to_string()))
    }
}
