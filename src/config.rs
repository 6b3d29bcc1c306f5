//! Scheduler configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Scheduler configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Database path for task persistence (None = in-memory database).
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

impl SchedulerConfig {
    /// Configuration backed by an on-disk database at `path`.
    pub fn with_db_path(path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: Some(path.into()),
        }
    }
}
