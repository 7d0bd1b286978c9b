//! Work queue configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where a named queue and its scheduler keep their state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkQueueConfig {
    /// Directory holding all durable state.
    pub state_dir: PathBuf,

    /// Queue name.
    #[serde(default = "default_queue_name")]
    pub queue_name: String,

    /// Scheduler name (None = same as the queue).
    #[serde(default)]
    pub scheduler_name: Option<String>,
}

fn default_queue_name() -> String {
    "main".to_string()
}

impl WorkQueueConfig {
    /// Configuration for the default queue under `state_dir`.
    pub fn new<P: AsRef<Path>>(state_dir: P) -> Self {
        Self {
            state_dir: state_dir.as_ref().to_path_buf(),
            queue_name: default_queue_name(),
            scheduler_name: None,
        }
    }

    /// Set the queue name.
    pub fn with_queue(mut self, name: impl Into<String>) -> Self {
        self.queue_name = name.into();
        self
    }

    /// Set the scheduler name.
    pub fn with_scheduler(mut self, name: impl Into<String>) -> Self {
        self.scheduler_name = Some(name.into());
        self
    }

    /// Effective scheduler name.
    pub fn scheduler_name(&self) -> &str {
        self.scheduler_name.as_deref().unwrap_or(&self.queue_name)
    }

    /// Directory of tasks waiting to run.
    pub fn pending_dir(&self) -> PathBuf {
        self.queue_dir().join("pending")
    }

    /// Directory of tasks whose handler failed.
    pub fn failed_dir(&self) -> PathBuf {
        self.queue_dir().join("failed")
    }

    /// File holding the scheduled tasks.
    pub fn schedule_file(&self) -> PathBuf {
        self.state_dir
            .join("schedules")
            .join(format!("{}.json", self.scheduler_name()))
    }

    fn queue_dir(&self) -> PathBuf {
        self.state_dir.join("queues").join(&self.queue_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let config = WorkQueueConfig::new("/var/lib/tq");
        assert_eq!(config.scheduler_name(), "main");
        assert_eq!(
            config.pending_dir(),
            PathBuf::from("/var/lib/tq/queues/main/pending")
        );
        assert_eq!(
            config.failed_dir(),
            PathBuf::from("/var/lib/tq/queues/main/failed")
        );
        assert_eq!(
            config.schedule_file(),
            PathBuf::from("/var/lib/tq/schedules/main.json")
        );
    }

    #[test]
    fn test_scheduler_name_override() {
        let config = WorkQueueConfig::new("/srv")
            .with_queue("mail")
            .with_scheduler("nightly");
        assert_eq!(config.pending_dir(), PathBuf::from("/srv/queues/mail/pending"));
        assert_eq!(config.schedule_file(), PathBuf::from("/srv/schedules/nightly.json"));
    }

    #[test]
    fn test_config_deserialize_defaults() {
        let config: WorkQueueConfig = serde_json::from_str(r#"{"state_dir": "/srv"}"#).unwrap();
        assert_eq!(config.queue_name, "main");
        assert!(config.scheduler_name.is_none());
    }
}
