//! # taskqueue daemon core
//!
//! Process lifecycle and control loop for `taskqueued`.
//!
//! ## Features
//!
//! - PID file management (prevents duplicate instances per state directory)
//! - Unix daemonization (fork, setsid, stdio redirected to a log file)
//! - Signal handling (SIGTERM/SIGINT for graceful shutdown, SIGCHLD reaping)
//! - Task processing loop with consecutive-failure escalation
//!
//! ## Usage
//!
//! ```rust,ignore
//! use taskqueue_daemon::{Daemon, DaemonConfig, ForkDaemonizer};
//!
//! let config = DaemonConfig::for_state_dir("/var/lib/taskqueue");
//! let daemon = Daemon::new(config)?;
//! let lock = daemon.start(&ForkDaemonizer::new(), &log_file)?;
//!
//! // Inside a tokio runtime built after `start`:
//! let exit = daemon.run(lock, queue, scheduler).await?;
//! ```

pub mod collaborator;
pub mod config;
pub mod daemon;
pub mod daemonize;
pub mod error;
pub mod fault;
pub mod pid;
pub mod runloop;
pub mod signal;

// Re-exports
pub use collaborator::{PluginLoader, PluginSelection, Queue, Scheduler};
pub use config::DaemonConfig;
pub use daemon::Daemon;
pub use daemonize::{Daemonizer, ForkDaemonizer};
pub use error::DaemonError;
pub use fault::{FaultAction, FaultGuard, IterationOutcome};
pub use pid::{PidFile, ReleaseOutcome};
pub use runloop::{LoopExit, TaskProcessingLoop};
pub use signal::{DaemonSignal, SignalController, SleepOutcome};
