//! Consecutive-failure circuit breaker for the task loop.
//!
//! [`FaultGuard::decide`] is a pure function: it never sleeps, logs or
//! touches the filesystem. The caller acts on the returned [`FaultAction`].

use std::time::Duration;

/// Consecutive failures tolerated before escalating.
pub const FAILURE_THRESHOLD: u32 = 5;

/// Pause after a failed iteration before trying again.
pub const COOLDOWN: Duration = Duration::from_secs(15);

/// Result of one loop iteration, as far as the breaker cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationOutcome {
    Success,
    Failure,
}

/// What the loop should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultAction {
    /// Carry on with the next iteration.
    ContinueNormal,
    /// Pause for the cooldown, then carry on.
    ContinueAfterCooldown(Duration),
    /// Stop the loop; the failure is not going away.
    EscalateFatal,
}

/// Failure escalation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultGuard {
    threshold: u32,
    cooldown: Duration,
}

impl FaultGuard {
    /// Guard with the standard threshold and cooldown.
    pub fn new() -> Self {
        Self {
            threshold: FAILURE_THRESHOLD,
            cooldown: COOLDOWN,
        }
    }

    /// Number of consecutive failures tolerated.
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Cooldown applied after a tolerated failure.
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Fold one outcome into the failure count.
    ///
    /// Returns the new count and the action to take.
    pub fn decide(&self, prior_failures: u32, outcome: IterationOutcome) -> (u32, FaultAction) {
        match outcome {
            IterationOutcome::Success => (0, FaultAction::ContinueNormal),
            IterationOutcome::Failure => {
                let failures = prior_failures.saturating_add(1);
                if failures > self.threshold {
                    (failures, FaultAction::EscalateFatal)
                } else {
                    (failures, FaultAction::ContinueAfterCooldown(self.cooldown))
                }
            }
        }
    }
}

impl Default for FaultGuard {
    fn default() -> Self {
        Self::new()
    }
}
