//! Task definitions.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::WorkQueueError;

/// A task waiting in, or rejected by, a queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task ID.
    pub id: Uuid,
    /// Registered task type that runs this task.
    pub task_type: String,
    /// Arguments passed to the handler.
    #[serde(default)]
    pub args: serde_json::Value,
    /// Creation time, used for FIFO ordering.
    pub created_at: DateTime<Utc>,
    /// Number of times a handler ran this task.
    #[serde(default)]
    pub attempts: u32,
    /// Last error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl Task {
    /// Create a new task.
    pub fn new(task_type: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_type: task_type.into(),
            args,
            created_at: Utc::now(),
            attempts: 0,
            last_error: None,
        }
    }
}

/// A task that enters the queue at a given time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTask {
    /// Unique schedule entry ID.
    pub id: Uuid,
    /// Task type of the promoted task.
    pub task_type: String,
    /// Arguments of the promoted task.
    #[serde(default)]
    pub args: serde_json::Value,
    /// When the task is next due.
    pub next_run: DateTime<Utc>,
    /// Cron expression (seconds first). None = one-shot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,
}

impl ScheduledTask {
    /// A task due once at `at`.
    pub fn once(task_type: impl Into<String>, args: serde_json::Value, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_type: task_type.into(),
            args,
            next_run: at,
            cron: None,
        }
    }

    /// A task due at every fire time of `cron`, starting after `now`.
    pub fn recurring(
        task_type: impl Into<String>,
        args: serde_json::Value,
        cron: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, WorkQueueError> {
        let cron = cron.into();
        let next_run = parse_cron(&cron)?
            .after(&now)
            .next()
            .ok_or_else(|| WorkQueueError::InvalidSchedule(format!("'{}' never fires", cron)))?;

        Ok(Self {
            id: Uuid::new_v4(),
            task_type: task_type.into(),
            args,
            next_run,
            cron: Some(cron),
        })
    }

    /// Check if the task is due at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_run <= now
    }

    /// Next fire time strictly after `after`. None for one-shot tasks.
    pub fn next_fire_after(
        &self,
        after: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, WorkQueueError> {
        match self.cron {
            Some(ref expr) => Ok(parse_cron(expr)?.after(&after).next()),
            None => Ok(None),
        }
    }

    /// The queue task this entry promotes to.
    pub fn to_task(&self) -> Task {
        Task::new(self.task_type.clone(), self.args.clone())
    }
}

fn parse_cron(expr: &str) -> Result<Schedule, WorkQueueError> {
    Schedule::from_str(expr)
        .map_err(|e| WorkQueueError::InvalidSchedule(format!("'{}': {}", expr, e)))
}
