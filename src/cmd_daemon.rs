//! Daemon subcommand handlers for taskqueued.

use std::error::Error;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info, warn};

use taskqueue_daemon::pid::{is_process_running, release_path};
use taskqueue_daemon::signal::send_signal_to_pid;
use taskqueue_daemon::{
    Daemon, DaemonError, DaemonSignal, Daemonizer, ForkDaemonizer, LoopExit, PidFile,
};
use taskqueue_workqueue::{FileQueue, FileScheduler, ManifestPluginLoader, TaskTypeRegistry};

use crate::cli::Commands;
use crate::run_config::RunConfig;

/// LSB exit status of `status` when no daemon is running.
const EXIT_NOT_RUNNING: u8 = 3;

/// Handle daemon subcommands.
pub(crate) fn handle_command(
    command: Commands,
    config: RunConfig,
) -> Result<ExitCode, Box<dyn Error>> {
    match command {
        Commands::Start => daemon_start(config),
        Commands::Stop { force } => daemon_stop(config, force),
        Commands::Status => daemon_status(config),
    }
}

/// Start the daemon and run it until shutdown.
fn daemon_start(config: RunConfig) -> Result<ExitCode, Box<dyn Error>> {
    std::fs::create_dir_all(&config.daemon.state_dir)?;
    let daemon = Daemon::new(config.daemon.clone())?;

    // Checked before loading plugins so a second start stays quiet
    if let Some(pid) = daemon.running_pid()? {
        info!("Daemon already running with PID {}", pid);
        return Ok(ExitCode::SUCCESS);
    }

    let registry = Arc::new(TaskTypeRegistry::new());
    let loader = ManifestPluginLoader::new(config.plugins.directories.clone(), registry.clone());
    config.plugins.load(&loader)?;
    info!("Registered task types: {:?}", registry.list_names());

    let Some(lock) = claim_lock(&daemon, &ForkDaemonizer::new(), &config.log_file())? else {
        return Ok(ExitCode::SUCCESS);
    };

    // Built only now: forking must happen while the process is single-threaded
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let exit = runtime.block_on(async {
        let queue = Arc::new(FileQueue::open(&config.workqueue, registry).await?);
        let scheduler = Arc::new(FileScheduler::open(&config.workqueue).await?);
        info!(
            "Serving queue '{}' with scheduler '{}'",
            queue.name(),
            scheduler.name()
        );
        Ok::<LoopExit, Box<dyn Error>>(daemon.run(lock, queue, scheduler).await?)
    })?;

    match exit {
        LoopExit::Shutdown => info!("Daemon exited normally"),
        LoopExit::FatalEscalation { failures } => {
            error!("Daemon stopped after {} consecutive failed iterations", failures)
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Detach if configured and take the pid lock.
///
/// Returns `None` when another instance won the lock, which is a clean exit.
fn claim_lock(
    daemon: &Daemon,
    daemonizer: &dyn Daemonizer,
    log_file: &Path,
) -> Result<Option<PidFile>, DaemonError> {
    match daemon.start(daemonizer, log_file) {
        Ok(lock) => Ok(Some(lock)),
        Err(e) if e.is_already_running() => {
            info!("{}", e);
            Ok(None)
        }
        Err(e) => {
            error!("Failed to start daemon: {}", e);
            Err(e)
        }
    }
}

/// Stop the daemon.
fn daemon_stop(config: RunConfig, force: bool) -> Result<ExitCode, Box<dyn Error>> {
    let daemon = Daemon::new(config.daemon)?;

    let Some(pid) = daemon.running_pid()? else {
        info!("Daemon is not running");
        return Ok(ExitCode::SUCCESS);
    };

    info!("Stopping daemon (PID: {})...", pid);
    let signal = if force {
        DaemonSignal::Terminate
    } else {
        DaemonSignal::Shutdown
    };
    send_signal_to_pid(pid, signal)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    let stopped = runtime.block_on(async {
        // An in-flight task finishes before the loop notices, so allow a while
        for _ in 0..100 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if !is_process_running(pid) {
                return true;
            }
        }
        false
    });

    if stopped {
        info!("Daemon stopped");
        // Left behind when the daemon was killed; the owner is dead by now
        if let Err(e) = release_path(&daemon.config().pid_file(), std::process::id()) {
            warn!("Failed to clean up PID file: {}", e);
        }
    } else if force {
        error!("Daemon did not stop in time");
    } else {
        warn!("Daemon did not stop gracefully, try --force");
    }

    Ok(ExitCode::SUCCESS)
}

/// Get daemon status.
fn daemon_status(config: RunConfig) -> Result<ExitCode, Box<dyn Error>> {
    let daemon = Daemon::new(config.daemon)?;
    let pid_path = daemon.config().pid_file();

    println!("taskqueued Status");
    println!("=================");
    println!("PID File: {}", pid_path.display());
    println!("Queue: {}", config.workqueue.queue_name);

    match daemon.running_pid()? {
        Some(pid) => {
            println!("\nDaemon is RUNNING (PID: {})", pid);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            println!("\nDaemon is NOT RUNNING");
            Ok(ExitCode::from(EXIT_NOT_RUNNING))
        }
    }
}
