//! Daemon configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// File name of the pid lock inside the state directory.
pub const PID_FILE_NAME: &str = "taskqueued.pid";

/// Daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Directory holding durable state.
    pub state_dir: PathBuf,

    /// Path to PID file.
    #[serde(default)]
    pub pid_file: Option<PathBuf>,

    /// Log file receiving stdout and stderr once daemonized.
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Upper bound for the idle sleep between loop iterations (in seconds).
    #[serde(default = "default_idle_window")]
    pub idle_window_secs: u64,

    /// Whether to daemonize (fork to background).
    /// Set to false for debugging or running under a supervisor.
    #[serde(default = "default_daemonize")]
    pub daemonize: bool,
}

fn default_idle_window() -> u64 {
    30
}

fn default_daemonize() -> bool {
    true
}

impl DaemonConfig {
    /// Create a config rooted at the given state directory.
    pub fn for_state_dir<P: AsRef<Path>>(state_dir: P) -> Self {
        Self {
            state_dir: state_dir.as_ref().to_path_buf(),
            pid_file: None,
            log_file: None,
            idle_window_secs: default_idle_window(),
            daemonize: default_daemonize(),
        }
    }

    /// Path of the pid lock, `{state_dir}/taskqueued.pid` unless overridden.
    pub fn pid_file(&self) -> PathBuf {
        self.pid_file
            .clone()
            .unwrap_or_else(|| self.state_dir.join(PID_FILE_NAME))
    }

    /// Path of the log file, `{state_dir}/{queue}_error.log` unless overridden.
    pub fn log_file(&self, queue_name: &str) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| self.state_dir.join(format!("{}_error.log", queue_name)))
    }

    /// Get the idle window as a Duration.
    pub fn idle_window(&self) -> Duration {
        Duration::from_secs(self.idle_window_secs)
    }

    /// Validate the configuration.
    ///
    /// Paths must be absolute because the daemon changes its working
    /// directory to `/` after forking.
    pub fn validate(&self) -> Result<(), String> {
        if !self.state_dir.is_absolute() {
            return Err(format!(
                "state directory must be absolute: {}",
                self.state_dir.display()
            ));
        }

        if let Some(ref log_file) = self.log_file {
            if !log_file.is_absolute() {
                return Err(format!(
                    "log file must be absolute: {}",
                    log_file.display()
                ));
            }
        }

        if self.idle_window_secs == 0 {
            return Err("idle_window_secs must be > 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
