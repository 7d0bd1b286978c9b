//! Task-type registry.
//!
//! Maps task type names to the handlers that run them. Plugins fill the
//! registry at startup; the queue consults it for every task.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::error::WorkQueueError;
use crate::task::Task;

/// Task handler trait.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Execute a task.
    async fn handle(&self, task: &Task) -> Result<(), WorkQueueError>;
}

/// Registry of task types.
pub struct TaskTypeRegistry {
    handlers: DashMap<String, Arc<dyn TaskHandler>>,
}

impl TaskTypeRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    /// Register a handler for `name`.
    ///
    /// Returns an error if the task type is already registered.
    pub fn register(
        &self,
        name: impl Into<String>,
        handler: Arc<dyn TaskHandler>,
    ) -> Result<(), WorkQueueError> {
        let name = name.into();
        if self.handlers.contains_key(&name) {
            return Err(WorkQueueError::Plugin(format!(
                "task type '{}' is already registered",
                name
            )));
        }

        self.handlers.insert(name, handler);
        Ok(())
    }

    /// Get the handler for a task type.
    pub fn get(&self, name: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(name).map(|h| h.clone())
    }

    /// Check if a task type is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// List all registered task types, sorted.
    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Get the number of registered task types.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for TaskTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Logs the task and its arguments.
pub struct LogHandler;

#[async_trait]
impl TaskHandler for LogHandler {
    async fn handle(&self, task: &Task) -> Result<(), WorkQueueError> {
        info!("Task {} ({}): {}", task.id, task.task_type, task.args);
        Ok(())
    }
}

/// Appends the task as one JSON line to a file.
pub struct AppendHandler {
    path: PathBuf,
}

impl AppendHandler {
    /// Create a handler appending to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TaskHandler for AppendHandler {
    async fn handle(&self, task: &Task) -> Result<(), WorkQueueError> {
        let mut line = serde_json::to_string(task)
            .map_err(|e| WorkQueueError::Serialization(e.to_string()))?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                WorkQueueError::Execution(format!("cannot open {:?}: {}", self.path, e))
            })?;
        file.write_all(line.as_bytes()).await.map_err(|e| {
            WorkQueueError::Execution(format!("cannot write {:?}: {}", self.path, e))
        })?;
        Ok(())
    }
}

/// Does nothing.
pub struct NoopHandler;

#[async_trait]
impl TaskHandler for NoopHandler {
    async fn handle(&self, _task: &Task) -> Result<(), WorkQueueError> {
        Ok(())
    }
}
