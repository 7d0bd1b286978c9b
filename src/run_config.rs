//! Runtime configuration assembled from the command line.

use std::path::{Path, PathBuf};

use taskqueue_daemon::{DaemonConfig, DaemonError, PluginSelection};
use taskqueue_workqueue::WorkQueueConfig;

use crate::cli::Cli;

/// Everything needed to start, stop or query one daemon instance.
#[derive(Debug, Clone)]
pub(crate) struct RunConfig {
    pub daemon: DaemonConfig,
    pub workqueue: WorkQueueConfig,
    pub plugins: PluginSelection,
}

impl RunConfig {
    /// Build the configuration, resolving relative paths against `cwd`.
    ///
    /// Paths are made absolute here because the daemon changes its working
    /// directory to `/` once detached.
    pub fn from_cli(cli: &Cli, cwd: &Path) -> Result<Self, DaemonError> {
        let state_dir = absolute(cwd, &cli.dir);

        let mut daemon = DaemonConfig::for_state_dir(&state_dir);
        daemon.log_file = cli.log_file.as_ref().map(|p| absolute(cwd, p));
        daemon.idle_window_secs = cli.idle_window;
        daemon.daemonize = !cli.foreground;
        daemon.validate().map_err(DaemonError::Config)?;

        let mut workqueue = WorkQueueConfig::new(&state_dir).with_queue(cli.queue.clone());
        if let Some(ref scheduler) = cli.scheduler {
            workqueue = workqueue.with_scheduler(scheduler.clone());
        }

        let plugins = PluginSelection {
            directories: cli.plugin_dirs.iter().map(|p| absolute(cwd, p)).collect(),
            namespaces: cli.namespaces.clone(),
            modules: cli.modules.clone(),
        };

        Ok(Self {
            daemon,
            workqueue,
            plugins,
        })
    }

    /// The log file receiving output once daemonized.
    pub fn log_file(&self) -> PathBuf {
        self.daemon.log_file(&self.workqueue.queue_name)
    }
}

fn absolute(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}
