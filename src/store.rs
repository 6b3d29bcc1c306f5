//! Task persistence store.

use async_trait::async_trait;
use rusqlite::params;
use std::collections::HashMap;
use std::path::Path;
use tokio_rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use crate::error::SchedulerError;
use crate::task::TaskRecord;

/// Task store trait for durable persistence.
///
/// Every operation is individually atomic; no cross-record transactions
/// are required. Implementations must tolerate concurrent calls from
/// independent runners.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert a new task. Fails if the id already exists.
    async fn save(&self, record: &TaskRecord) -> Result<(), SchedulerError>;

    /// Load a task by ID.
    async fn load(&self, id: &Uuid) -> Result<Option<TaskRecord>, SchedulerError>;

    /// Load all persisted tasks. Order is not significant.
    async fn load_all(&self) -> Result<Vec<TaskRecord>, SchedulerError>;

    /// Overwrite an existing task. Fails if the id is absent.
    async fn update(&self, record: &TaskRecord) -> Result<(), SchedulerError>;

    /// Delete a task. A no-op if already absent.
    async fn delete(&self, id: &Uuid) -> Result<(), SchedulerError>;
}

/// In-memory task store for testing and ephemeral schedulers.
pub struct MemoryTaskStore {
    tasks: tokio::sync::RwLock<HashMap<Uuid, TaskRecord>>,
}

impl MemoryTaskStore {
    /// Create a new memory store.
    pub fn new() -> Self {
        Self {
            tasks: tokio::sync::RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn save(&self, record: &TaskRecord) -> Result<(), SchedulerError> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&record.id) {
            return Err(SchedulerError::Storage(format!(
                "task {} already exists",
                record.id
            )));
        }
        tasks.insert(record.id, record.clone());
        Ok(())
    }

    async fn load(&self, id: &Uuid) -> Result<Option<TaskRecord>, SchedulerError> {
        let tasks = self.tasks.read().await;
        Ok(tasks.get(id).cloned())
    }

    async fn load_all(&self) -> Result<Vec<TaskRecord>, SchedulerError> {
        let tasks = self.tasks.read().await;
        Ok(tasks.values().cloned().collect())
    }

    async fn update(&self, record: &TaskRecord) -> Result<(), SchedulerError> {
        let mut tasks = self.tasks.write().await;
        if !tasks.contains_key(&record.id) {
            return Err(SchedulerError::Storage(format!(
                "no task {} to update",
                record.id
            )));
        }
        tasks.insert(record.id, record.clone());
        Ok(())
    }

    async fn delete(&self, id: &Uuid) -> Result<(), SchedulerError> {
        let mut tasks = self.tasks.write().await;
        tasks.remove(id);
        Ok(())
    }
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    data BLOB NOT NULL
);
"#;

/// SQLite-backed task store.
///
/// Records are stored as opaque serialized payloads keyed by id; the
/// database never interprets payload contents.
pub struct SqliteTaskStore {
    conn: Connection,
}

impl SqliteTaskStore {
    /// Create a new in-memory database.
    pub async fn in_memory() -> Result<Self, SchedulerError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| SchedulerError::Storage(e.to_string()))?;
        Self::init(conn).await
    }

    /// Create a new file-backed database.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SchedulerError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(path)
            .await
            .map_err(|e| SchedulerError::Storage(e.to_string()))?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, SchedulerError> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
        .map_err(|e| SchedulerError::Storage(e.to_string()))?;

        debug!("SQLite task store initialized");
        Ok(Self { conn })
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn save(&self, record: &TaskRecord) -> Result<(), SchedulerError> {
        let id = record.id.to_string();
        let data = record.to_bytes()?;

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO tasks (id, data) VALUES (?1, ?2)",
                    params![id, data],
                )?;
                Ok(())
            })
            .await
            .map_err(|e| SchedulerError::Storage(e.to_string()))?;

        debug!("Saved task {} to storage", record.id);
        Ok(())
    }

    async fn load(&self, id: &Uuid) -> Result<Option<TaskRecord>, SchedulerError> {
        let key = id.to_string();

        let blob: Option<Vec<u8>> = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT data FROM tasks WHERE id = ?1")?;
                match stmt.query_row([&key], |row| row.get::<_, Vec<u8>>(0)) {
                    Ok(data) => Ok(Some(data)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(|e| SchedulerError::Storage(e.to_string()))?;

        match blob {
            Some(data) => Ok(Some(TaskRecord::from_bytes(&data)?)),
            None => Ok(None),
        }
    }

    async fn load_all(&self) -> Result<Vec<TaskRecord>, SchedulerError> {
        let blobs: Vec<Vec<u8>> = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT data FROM tasks")?;
                let rows = stmt
                    .query_map([], |row| row.get::<_, Vec<u8>>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(|e| SchedulerError::Storage(e.to_string()))?;

        let mut records = Vec::with_capacity(blobs.len());
        for data in &blobs {
            records.push(TaskRecord::from_bytes(data)?);
        }

        debug!("Loaded {} tasks from storage", records.len());
        Ok(records)
    }

    async fn update(&self, record: &TaskRecord) -> Result<(), SchedulerError> {
        let id = record.id.to_string();
        let data = record.to_bytes()?;

        let rows = self
            .conn
            .call(move |conn| {
                let rows = conn.execute(
                    "UPDATE tasks SET data = ?1 WHERE id = ?2",
                    params![data, id],
                )?;
                Ok(rows)
            })
            .await
            .map_err(|e| SchedulerError::Storage(e.to_string()))?;

        if rows == 0 {
            return Err(SchedulerError::Storage(format!(
                "no task {} to update",
                record.id
            )));
        }

        debug!("Updated task {} in storage", record.id);
        Ok(())
    }

    async fn delete(&self, id: &Uuid) -> Result<(), SchedulerError> {
        let key = id.to_string();

        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM tasks WHERE id = ?1", [&key])?;
                Ok(())
            })
            .await
            .map_err(|e| SchedulerError::Storage(e.to_string()))?;

        debug!("Removed task {} from storage", id);
        Ok(())
    }
}
