//! Contracts the daemon core consumes from its queue, scheduler and plugin
//! implementations.
//!
//! The core only distinguishes success from failure; implementations map
//! their own errors into [`DaemonError::Collaborator`].

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::error::DaemonError;

/// Durable queue of pending tasks.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Whether at least one task is waiting. No side effects.
    async fn has_work_to_do(&self) -> Result<bool, DaemonError>;

    /// Process exactly one task.
    async fn process_next_task(&self) -> Result<(), DaemonError>;
}

/// Holder of time-triggered tasks that feed a queue of type `Q`.
#[async_trait]
pub trait Scheduler<Q: Queue + ?Sized>: Send + Sync {
    /// Move every task that is due into `queue`. A no-op when nothing is due.
    async fn process_ready_tasks(&self, queue: &Q) -> Result<(), DaemonError>;

    /// Time until the next scheduled task is due, or `None` if there is none.
    async fn seconds_until_next_task(&self) -> Result<Option<Duration>, DaemonError>;
}

/// Populates the task-type registry consulted while tasks run.
pub trait PluginLoader {
    /// Load one plugin module by name. Failure is fatal to startup.
    fn load_plugin_by_name(&self, name: &str) -> Result<(), DaemonError>;

    /// Scan `directories` for plugins in any of `namespaces`.
    ///
    /// Lenient: files that do not match are skipped. Returns how many
    /// plugins were loaded.
    fn load_all_plugins(
        &self,
        directories: &[PathBuf],
        namespaces: &[String],
    ) -> Result<usize, DaemonError>;
}

/// Which plugins to load at startup.
#[derive(Debug, Clone, Default)]
pub struct PluginSelection {
    /// Directories searched for plugins.
    pub directories: Vec<PathBuf>,
    /// Namespaces accepted when scanning.
    pub namespaces: Vec<String>,
    /// Explicit module names; when non-empty, scanning is skipped.
    pub modules: Vec<String>,
}

impl PluginSelection {
    /// Load the selected plugins through `loader`.
    ///
    /// Explicitly named modules must all load. Otherwise every directory is
    /// scanned for the configured namespaces.
    pub fn load(&self, loader: &dyn PluginLoader) -> Result<usize, DaemonError> {
        if self.directories.is_empty() {
            return Err(DaemonError::Config(
                "at least one plugin directory is required".to_string(),
            ));
        }

        if !self.modules.is_empty() {
            for name in &self.modules {
                loader.load_plugin_by_name(name)?;
            }
            info!("Loaded {} named plugin module(s)", self.modules.len());
            return Ok(self.modules.len());
        }

        let loaded = loader.load_all_plugins(&self.directories, &self.namespaces)?;
        info!(
            "Loaded {} plugin module(s) from {} director(ies)",
            loaded,
            self.directories.len()
        );
        Ok(loaded)
    }
}
