//! File-backed scheduler of time-triggered tasks.
//!
//! All entries of one scheduler live in a single JSON array at
//! `{state_dir}/schedules/{scheduler}.json`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use taskqueue_daemon::{DaemonError, Scheduler};
use tokio::fs;
use tracing::{debug, error, info};

use crate::config::WorkQueueConfig;
use crate::error::WorkQueueError;
use crate::queue::FileQueue;
use crate::store;
use crate::task::ScheduledTask;

/// Promotes due [`ScheduledTask`]s into a [`FileQueue`].
pub struct FileScheduler {
    name: String,
    path: PathBuf,
}

impl FileScheduler {
    /// Open the scheduler described by `config`, creating its directory.
    pub async fn open(config: &WorkQueueConfig) -> Result<Self, WorkQueueError> {
        let path = config.schedule_file();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await.map_err(|e| {
                WorkQueueError::Storage(format!("Failed to create {:?}: {}", dir, e))
            })?;
        }

        debug!("FileScheduler '{}' opened at {:?}", config.scheduler_name(), path);

        Ok(Self {
            name: config.scheduler_name().to_string(),
            path,
        })
    }

    /// Scheduler name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the schedule file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All scheduled tasks. A missing file means none.
    pub async fn load(&self) -> Result<Vec<ScheduledTask>, WorkQueueError> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(Vec::new());
        }
        store::read_json(&self.path).await
    }

    /// Add a scheduled task.
    pub async fn add(&self, task: ScheduledTask) -> Result<(), WorkQueueError> {
        let mut tasks = self.load().await?;
        info!(
            "Scheduled task {} ({}) for {}",
            task.id, task.task_type, task.next_run
        );
        tasks.push(task);
        store::write_json(&self.path, &tasks).await
    }

    /// Move every task due at `now` into `queue`. Returns how many moved.
    ///
    /// Recurring tasks are re-armed to their next fire time after `now`;
    /// one-shot tasks are removed. An entry whose cron expression no longer
    /// parses is dropped without being enqueued.
    pub async fn promote_due(
        &self,
        queue: &FileQueue,
        now: DateTime<Utc>,
    ) -> Result<usize, WorkQueueError> {
        let tasks = self.load().await?;
        if !tasks.iter().any(|t| t.is_due(now)) {
            return Ok(0);
        }

        let mut promoted = 0;
        let mut remaining = Vec::with_capacity(tasks.len());

        for mut task in tasks {
            if !task.is_due(now) {
                remaining.push(task);
                continue;
            }

            let rearm = match task.next_fire_after(now) {
                Ok(next) => next,
                Err(e) => {
                    error!("Dropping scheduled task {}: {}", task.id, e);
                    continue;
                }
            };

            queue.enqueue(&task.to_task()).await?;
            promoted += 1;

            if let Some(next_run) = rearm {
                debug!("Re-armed scheduled task {} for {}", task.id, next_run);
                task.next_run = next_run;
                remaining.push(task);
            }
        }

        store::write_json(&self.path, &remaining).await?;
        if promoted > 0 {
            info!("Promoted {} scheduled task(s) into '{}'", promoted, queue.name());
        }
        Ok(promoted)
    }

    /// Time from `now` until the earliest scheduled task, zero if overdue.
    pub async fn next_due(&self, now: DateTime<Utc>) -> Result<Option<Duration>, WorkQueueError> {
        let tasks = self.load().await?;
        Ok(tasks
            .iter()
            .map(|t| t.next_run)
            .min()
            .map(|next| (next - now).to_std().unwrap_or(Duration::ZERO)))
    }
}

#[async_trait]
impl Scheduler<FileQueue> for FileScheduler {
    async fn process_ready_tasks(&self, queue: &FileQueue) -> Result<(), DaemonError> {
        self.promote_due(queue, Utc::now()).await?;
        Ok(())
    }

    async fn seconds_until_next_task(&self) -> Result<Option<Duration>, DaemonError> {
        Ok(self.next_due(Utc::now()).await?)
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
