//! taskqueued - durable task queue daemon
//!
//! Main entry point for the taskqueued CLI.

mod cli;
mod cmd_daemon;
mod run_config;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::{Cli, Commands};
use crate::run_config::RunConfig;

/// Initialize tracing on stderr.
///
/// The writer is unbuffered and owns no thread, so it keeps working across
/// the daemonizing fork and then writes to the log file behind fd 2.
fn init_tracing(ansi: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_ansi(ansi)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cwd = std::env::current_dir()?;
    let args = cli::expand_args(std::env::args(), &cwd)?;
    let cli = Cli::parse_from(args);

    let command = cli.command.unwrap_or(Commands::Start);
    let config = RunConfig::from_cli(&cli, &cwd)?;

    // Colours only while attached to a terminal session
    init_tracing(command != Commands::Start || !config.daemon.daemonize);

    cmd_daemon::handle_command(command, config)
}
