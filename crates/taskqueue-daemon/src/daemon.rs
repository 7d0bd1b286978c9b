//! Core daemon process management.

use std::sync::Arc;

use tracing::{info, warn};

use crate::collaborator::{Queue, Scheduler};
use crate::config::DaemonConfig;
use crate::daemonize::Daemonizer;
use crate::error::DaemonError;
use crate::pid::{self, PidFile, ReleaseOutcome};
use crate::runloop::{LoopExit, TaskProcessingLoop};
use crate::signal::SignalController;

/// The daemon process manager.
pub struct Daemon {
    config: DaemonConfig,
    signals: SignalController,
}

impl Daemon {
    /// Create a new daemon instance.
    pub fn new(config: DaemonConfig) -> Result<Self, DaemonError> {
        config.validate().map_err(DaemonError::Config)?;

        Ok(Self {
            config,
            signals: SignalController::new(),
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    /// Get the signal controller.
    pub fn signals(&self) -> &SignalController {
        &self.signals
    }

    /// Get the PID of a running daemon, if any.
    pub fn running_pid(&self) -> Result<Option<u32>, DaemonError> {
        pid::probe(&self.config.pid_file())
    }

    /// Claim the single-instance lock, backgrounding first if configured.
    ///
    /// Must run before any async runtime exists. A live owner found before
    /// forking, or by the authoritative acquire afterwards, is reported as
    /// [`DaemonError::AlreadyRunning`].
    pub fn start(
        &self,
        daemonizer: &dyn Daemonizer,
        log_file: &std::path::Path,
    ) -> Result<PidFile, DaemonError> {
        info!("Daemon starting...");
        let pid_path = self.config.pid_file();

        if let Some(pid) = self.running_pid()? {
            return Err(DaemonError::AlreadyRunning {
                path: pid_path,
                pid,
            });
        }

        if self.config.daemonize {
            daemonizer.detach(log_file)?;
        }

        PidFile::acquire(&pid_path)
    }

    /// Run the task loop until shutdown or escalation, then release `lock`.
    pub async fn run<Q, S>(
        &self,
        lock: PidFile,
        queue: Arc<Q>,
        scheduler: Arc<S>,
    ) -> Result<LoopExit, DaemonError>
    where
        Q: Queue + ?Sized,
        S: Scheduler<Q> + ?Sized,
    {
        // Dropping the lock on the error path still releases it
        self.signals.setup_os_signals().await?;
        info!("Daemon started (PID: {})", std::process::id());

        let exit = TaskProcessingLoop::new(queue, scheduler, self.signals.clone())
            .with_idle_window(self.config.idle_window())
            .run()
            .await;

        info!("Daemon shutting down ({})...", exit);
        match lock.release() {
            Ok(ReleaseOutcome::Skipped { owner }) => {
                warn!("PID file now owned by PID {}, left in place", owner)
            }
            Ok(_) => {}
            Err(e) => warn!("Failed to release PID file: {}", e),
        }

        info!("Daemon stopped");
        Ok(exit)
    }
}

#[cfg(test)]
#[path = "daemon_tests.rs"]
mod tests;
