//! File-backed FIFO task queue.
//!
//! Each pending task is one JSON file:
//! ```text
//! {state_dir}/queues/{queue}/
//! ├── pending/
//! │   └── {created_at_micros}-{uuid}.json
//! └── failed/
//!     └── {uuid}.json
//! ```
//! File names sort in creation order, so the oldest task is the first file.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use taskqueue_daemon::{DaemonError, Queue};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::WorkQueueConfig;
use crate::error::WorkQueueError;
use crate::registry::TaskTypeRegistry;
use crate::store;
use crate::task::Task;

/// Durable FIFO queue stored in a directory.
pub struct FileQueue {
    name: String,
    pending_dir: PathBuf,
    failed_dir: PathBuf,
    registry: Arc<TaskTypeRegistry>,
}

impl FileQueue {
    /// Open the queue described by `config`, creating its directories.
    pub async fn open(
        config: &WorkQueueConfig,
        registry: Arc<TaskTypeRegistry>,
    ) -> Result<Self, WorkQueueError> {
        let pending_dir = config.pending_dir();
        let failed_dir = config.failed_dir();

        for dir in [&pending_dir, &failed_dir] {
            fs::create_dir_all(dir).await.map_err(|e| {
                WorkQueueError::Storage(format!("Failed to create {:?}: {}", dir, e))
            })?;
        }

        debug!("FileQueue '{}' opened at {:?}", config.queue_name, pending_dir);

        Ok(Self {
            name: config.queue_name.clone(),
            pending_dir,
            failed_dir,
            registry,
        })
    }

    /// Queue name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a task to the end of the queue.
    pub async fn enqueue(&self, task: &Task) -> Result<(), WorkQueueError> {
        let path = self.pending_dir.join(format!(
            "{:020}-{}.json",
            task.created_at.timestamp_micros().max(0),
            task.id
        ));
        store::write_json(&path, task).await?;
        debug!("Enqueued task {} ({}) on '{}'", task.id, task.task_type, self.name);
        Ok(())
    }

    /// Number of pending tasks.
    pub async fn pending_len(&self) -> Result<usize, WorkQueueError> {
        Ok(store::list_json(&self.pending_dir).await?.len())
    }

    /// Tasks whose handler failed, oldest first.
    pub async fn failed_tasks(&self) -> Result<Vec<Task>, WorkQueueError> {
        let mut tasks = Vec::new();
        for path in store::list_json(&self.failed_dir).await? {
            tasks.push(store::read_json::<Task>(&path).await?);
        }
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(tasks)
    }

    /// Run the oldest pending task. Returns false if the queue was empty.
    ///
    /// A handler failure moves the task to `failed/` and is not an error.
    /// An unreadable pending file is, and the file stays where it is.
    pub async fn process_next(&self) -> Result<bool, WorkQueueError> {
        let Some(path) = store::list_json(&self.pending_dir).await?.into_iter().next() else {
            return Ok(false);
        };

        let mut task: Task = store::read_json(&path).await?;
        task.attempts += 1;
        debug!("Processing task {} ({})", task.id, task.task_type);

        let result = match self.registry.get(&task.task_type) {
            Some(handler) => handler.handle(&task).await,
            None => Err(WorkQueueError::UnknownTaskType(task.task_type.clone())),
        };

        match result {
            Ok(()) => {
                debug!("Task {} completed", task.id);
            }
            Err(e) => {
                warn!("Task {} ({}) failed: {}", task.id, task.task_type, e);
                task.last_error = Some(e.to_string());
                let failed = self.failed_dir.join(format!("{}.json", task.id));
                store::write_json(&failed, &task).await?;
                info!("Moved task {} to {:?}", task.id, failed);
            }
        }

        store::remove(&path).await?;
        Ok(true)
    }
}

#[async_trait]
impl Queue for FileQueue {
    async fn has_work_to_do(&self) -> Result<bool, DaemonError> {
        Ok(self.pending_len().await? > 0)
    }

    async fn process_next_task(&self) -> Result<(), DaemonError> {
        self.process_next().await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
