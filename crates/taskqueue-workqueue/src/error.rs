//! Work queue errors.

use taskqueue_daemon::DaemonError;
use thiserror::Error;

/// Work queue error types.
#[derive(Debug, Error)]
pub enum WorkQueueError {
    /// Reading or writing queue state failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A task or schedule file could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// No handler is registered for the task type.
    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),

    /// A plugin manifest could not be found or loaded.
    #[error("Plugin error: {0}")]
    Plugin(String),

    /// A scheduled task carries an unusable cron expression.
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// A task handler failed.
    #[error("Task execution failed: {0}")]
    Execution(String),
}

impl From<WorkQueueError> for DaemonError {
    fn from(e: WorkQueueError) -> Self {
        DaemonError::Collaborator(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converts_to_collaborator_error() {
        let err: DaemonError = WorkQueueError::Storage("disk full".to_string()).into();
        match err {
            DaemonError::Collaborator(msg) => assert!(msg.contains("disk full")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
