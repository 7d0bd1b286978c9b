//! Daemon-related errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during daemon operations.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// PID file exists and its owner is alive.
    #[error("Daemon already running (PID file: {path}, PID: {pid})")]
    AlreadyRunning { path: PathBuf, pid: u32 },

    /// Failed to create PID file.
    #[error("Failed to create PID file at {path}: {reason}")]
    PidFileCreation { path: PathBuf, reason: String },

    /// Failed to read PID file.
    #[error("Failed to read PID file at {path}: {reason}")]
    PidFileRead { path: PathBuf, reason: String },

    /// Failed to remove PID file.
    #[error("Failed to remove PID file at {path}: {reason}")]
    PidFileRemoval { path: PathBuf, reason: String },

    /// Process fork failed.
    #[error("Failed to fork process: {0}")]
    ForkFailed(String),

    /// Failed to open or redirect to the log file.
    #[error("Failed to open log file {path}: {reason}")]
    LogFile { path: PathBuf, reason: String },

    /// Failed to set up signal handlers.
    #[error("Failed to set up signal handlers: {0}")]
    SignalSetup(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A queue, scheduler or plugin collaborator failed.
    #[error("{0}")]
    Collaborator(String),
}

impl DaemonError {
    /// Whether this error means another instance owns the lock.
    ///
    /// Callers treat this as a clean shutdown rather than a failure.
    pub fn is_already_running(&self) -> bool {
        matches!(self, DaemonError::AlreadyRunning { .. })
    }
}
