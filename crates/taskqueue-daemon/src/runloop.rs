//! The task processing loop.
//!
//! Each iteration promotes due scheduled tasks, then either processes one
//! queued task or sleeps until the next scheduled task (bounded by the idle
//! window). Failed iterations go through the [`FaultGuard`].

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::collaborator::{Queue, Scheduler};
use crate::error::DaemonError;
use crate::fault::{FaultAction, FaultGuard, IterationOutcome};
use crate::signal::SignalController;

/// Default upper bound for the idle sleep.
pub const DEFAULT_IDLE_WINDOW: Duration = Duration::from_secs(30);

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// Shutdown was requested.
    Shutdown,
    /// Too many consecutive iterations failed.
    FatalEscalation { failures: u32 },
}

impl std::fmt::Display for LoopExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopExit::Shutdown => write!(f, "shutdown"),
            LoopExit::FatalEscalation { failures } => {
                write!(f, "fatal escalation after {} consecutive failures", failures)
            }
        }
    }
}

/// How long to sleep when the queue is empty.
///
/// `None` means do not sleep at all: a scheduled task is already due.
pub fn wait_schedule(next_due: Option<Duration>, idle_window: Duration) -> Option<Duration> {
    match next_due {
        Some(due) if due.is_zero() => None,
        Some(due) => Some(due.min(idle_window)),
        None => Some(idle_window),
    }
}

/// Drives a queue and its scheduler until shutdown or escalation.
pub struct TaskProcessingLoop<Q: ?Sized, S: ?Sized> {
    queue: Arc<Q>,
    scheduler: Arc<S>,
    signals: SignalController,
    guard: FaultGuard,
    idle_window: Duration,
}

impl<Q, S> TaskProcessingLoop<Q, S>
where
    Q: Queue + ?Sized,
    S: Scheduler<Q> + ?Sized,
{
    /// Create a loop over `queue` and `scheduler`, stopped through `signals`.
    pub fn new(queue: Arc<Q>, scheduler: Arc<S>, signals: SignalController) -> Self {
        Self {
            queue,
            scheduler,
            signals,
            guard: FaultGuard::new(),
            idle_window: DEFAULT_IDLE_WINDOW,
        }
    }

    /// Set the idle window.
    pub fn with_idle_window(mut self, idle_window: Duration) -> Self {
        self.idle_window = idle_window;
        self
    }

    /// Run until the running flag is cleared or the fault guard escalates.
    ///
    /// The flag is checked between iterations only; an iteration that has
    /// started always completes.
    pub async fn run(&self) -> LoopExit {
        let mut failures = 0u32;
        info!("Task loop started (idle window: {:?})", self.idle_window);

        loop {
            if !self.signals.is_running() {
                info!("Shutdown requested, leaving task loop");
                return LoopExit::Shutdown;
            }

            let outcome = match self.iterate().await {
                Ok(()) => IterationOutcome::Success,
                Err(e) => {
                    error!("Task loop iteration failed: {}", e);
                    IterationOutcome::Failure
                }
            };

            let (next_failures, action) = self.guard.decide(failures, outcome);
            failures = next_failures;

            match action {
                FaultAction::ContinueNormal => {}
                FaultAction::ContinueAfterCooldown(cooldown) => {
                    warn!(
                        "{}/{} consecutive failures, cooling down for {:?}",
                        failures,
                        self.guard.threshold(),
                        cooldown
                    );
                    self.signals.sleep(cooldown).await;
                }
                FaultAction::EscalateFatal => {
                    error!(
                        "Giving up after {} consecutive failures, stopping daemon",
                        failures
                    );
                    return LoopExit::FatalEscalation { failures };
                }
            }
        }
    }

    /// One pass: promote, then process one task or wait.
    async fn iterate(&self) -> Result<(), DaemonError> {
        self.scheduler.process_ready_tasks(self.queue.as_ref()).await?;

        if self.queue.has_work_to_do().await? {
            return self.queue.process_next_task().await;
        }

        let next_due = self.scheduler.seconds_until_next_task().await?;
        match wait_schedule(next_due, self.idle_window) {
            None => debug!("Scheduled task due now, skipping sleep"),
            Some(wait) => {
                debug!("Queue empty, sleeping for {:?}", wait);
                self.signals.sleep(wait).await;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "runloop_tests.rs"]
mod tests;
