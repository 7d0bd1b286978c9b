//! Signal handling for daemon processes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, info};

use crate::error::DaemonError;

/// Signal sent to a running daemon by the control commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonSignal {
    /// Graceful shutdown (SIGTERM).
    Shutdown,
    /// Force terminate (SIGKILL).
    Terminate,
}

impl std::fmt::Display for DaemonSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DaemonSignal::Shutdown => write!(f, "SHUTDOWN"),
            DaemonSignal::Terminate => write!(f, "TERMINATE"),
        }
    }
}

/// How an interruptible sleep ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepOutcome {
    /// The full duration passed.
    Elapsed,
    /// Shutdown was requested first.
    Interrupted,
}

/// Owner of the process-wide running flag.
///
/// Signal tasks only ever clear the flag and wake sleepers; everything else
/// the loop owns stays out of their reach.
#[derive(Clone)]
pub struct SignalController {
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl SignalController {
    /// Create a new controller with the running flag set.
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Whether shutdown has not been requested yet.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Request shutdown.
    pub fn request_shutdown(&self) {
        debug!("Shutdown requested");
        self.running.store(false, Ordering::SeqCst);
        self.wake.notify_waiters();
    }

    /// Resolve once shutdown has been requested.
    pub async fn wait_for_shutdown(&self) {
        loop {
            let notified = self.wake.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent request is not lost
            notified.as_mut().enable();
            if !self.is_running() {
                return;
            }
            notified.await;
        }
    }

    /// Sleep for `duration`, returning early if shutdown is requested.
    pub async fn sleep(&self, duration: Duration) -> SleepOutcome {
        tokio::select! {
            _ = tokio::time::sleep(duration) => SleepOutcome::Elapsed,
            _ = self.wait_for_shutdown() => SleepOutcome::Interrupted,
        }
    }

    /// Set up OS signal handlers (Unix only).
    ///
    /// SIGTERM and SIGINT request shutdown. SIGCHLD reaps terminated
    /// children. Must be called from inside a tokio runtime.
    #[cfg(unix)]
    pub async fn setup_os_signals(&self) -> Result<(), DaemonError> {
        use tokio::signal::unix::{signal, SignalKind};

        for (kind, name) in [
            (SignalKind::terminate(), "SIGTERM"),
            (SignalKind::interrupt(), "SIGINT"),
        ] {
            let mut stream =
                signal(kind).map_err(|e| DaemonError::SignalSetup(e.to_string()))?;
            let controller = self.clone();
            tokio::spawn(async move {
                while stream.recv().await.is_some() {
                    info!("Received {}", name);
                    controller.request_shutdown();
                }
            });
        }

        let mut sigchld =
            signal(SignalKind::child()).map_err(|e| DaemonError::SignalSetup(e.to_string()))?;
        tokio::spawn(async move {
            while sigchld.recv().await.is_some() {
                let reaped = reap_children();
                debug!("SIGCHLD handled, reaped {} child(ren)", reaped);
            }
        });

        info!("OS signal handlers installed (SIGTERM, SIGINT, SIGCHLD)");
        Ok(())
    }

    /// Set up OS signal handlers (non-Unix fallback).
    #[cfg(not(unix))]
    pub async fn setup_os_signals(&self) -> Result<(), DaemonError> {
        let controller = self.clone();

        // Only Ctrl+C is available on non-Unix
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received Ctrl+C");
                controller.request_shutdown();
            }
        });

        info!("OS signal handlers installed (Ctrl+C only)");
        Ok(())
    }
}

impl Default for SignalController {
    fn default() -> Self {
        Self::new()
    }
}

/// Collect every terminated child without blocking.
///
/// Returns how many children were reaped.
#[cfg(unix)]
pub fn reap_children() -> usize {
    use nix::errno::Errno;
    use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};

    let mut reaped = 0;
    loop {
        match waitpid(None, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::Exited(pid, code)) => {
                info!("Child {} exited with status {}", pid, code);
                reaped += 1;
            }
            Ok(WaitStatus::Signaled(pid, signal, core_dumped)) => {
                info!(
                    "Child {} terminated by signal {}{}",
                    pid,
                    signal,
                    if core_dumped { " (core dumped)" } else { "" }
                );
                reaped += 1;
            }
            Ok(WaitStatus::StillAlive) | Err(Errno::ECHILD) => break,
            Ok(other) => {
                debug!("Ignoring child state change: {:?}", other);
                break;
            }
            Err(e) => {
                debug!("waitpid failed: {}", e);
                break;
            }
        }
    }
    reaped
}

#[cfg(not(unix))]
pub fn reap_children() -> usize {
    0
}

/// Send a signal to a running daemon process.
#[cfg(unix)]
pub fn send_signal_to_pid(pid: u32, signal: DaemonSignal) -> Result<(), DaemonError> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let nix_signal = match signal {
        DaemonSignal::Shutdown => Signal::SIGTERM,
        DaemonSignal::Terminate => Signal::SIGKILL,
    };

    let raw = i32::try_from(pid)
        .map_err(|_| DaemonError::Config(format!("PID {} out of range", pid)))?;
    kill(Pid::from_raw(raw), nix_signal).map_err(|e| {
        DaemonError::SignalSetup(format!("Failed to send {} to PID {}: {}", signal, pid, e))
    })?;

    info!("Sent {} to PID {}", signal, pid);
    Ok(())
}

#[cfg(not(unix))]
pub fn send_signal_to_pid(_pid: u32, _signal: DaemonSignal) -> Result<(), DaemonError> {
    Err(DaemonError::SignalSetup(
        "Signal sending not supported on this platform".to_string(),
    ))
}

#[cfg(test)]
#[path = "signal_tests.rs"]
mod tests;
