//! CLI definitions for taskqueued.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

/// Argument file read from the working directory when no `@file` is given.
pub(crate) const DEFAULT_ARGS_FILE: &str = "taskqueue.cfg";

/// taskqueued CLI.
#[derive(Parser, Debug)]
#[command(name = "taskqueued")]
#[command(about = "Drain a durable task queue and run scheduled tasks")]
#[command(version)]
pub(crate) struct Cli {
    /// Directory for queue, schedule and PID state
    #[arg(short, long)]
    pub dir: PathBuf,

    /// Queue name
    #[arg(short, long, default_value = "main")]
    pub queue: String,

    /// Scheduler name (default: the queue name)
    #[arg(short, long)]
    pub scheduler: Option<String>,

    /// Plugin directory (repeatable)
    #[arg(short = 'p', long = "plugin-dir")]
    pub plugin_dirs: Vec<PathBuf>,

    /// Plugin namespace accepted when scanning (repeatable)
    #[arg(short = 'n', long = "namespace", default_value = "taskqueue.plugins")]
    pub namespaces: Vec<String>,

    /// Plugin module to load by name (repeatable, disables scanning)
    #[arg(short = 'm', long = "module")]
    pub modules: Vec<String>,

    /// Log file (default: {dir}/{queue}_error.log)
    #[arg(short, long)]
    pub log_file: Option<PathBuf>,

    /// Maximum idle sleep between loop iterations, in seconds
    #[arg(long, default_value_t = 30)]
    pub idle_window: u64,

    /// Run in foreground (don't daemonize)
    #[arg(short, long)]
    pub foreground: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Commands {
    /// Start the daemon (default)
    Start,

    /// Stop a running daemon
    Stop {
        /// Kill with SIGKILL instead of asking for a graceful shutdown
        #[arg(long)]
        force: bool,
    },

    /// Report whether a daemon is running (exit 3 if not)
    Status,
}

/// Splice argument-file tokens into `args` (program name first).
///
/// A leading `@path` argument is replaced by the tokens of that file.
/// Otherwise the tokens of `taskqueue.cfg` in `cwd`, if present, are
/// inserted before the command-line arguments.
pub(crate) fn expand_args<I>(args: I, cwd: &Path) -> std::io::Result<Vec<String>>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut expanded: Vec<String> = args.next().into_iter().collect();
    let rest: Vec<String> = args.collect();

    if let Some(file) = rest.first().and_then(|a| a.strip_prefix('@')) {
        let content = std::fs::read_to_string(cwd.join(file))?;
        expanded.extend(parse_args_file(&content));
        expanded.extend(rest.into_iter().skip(1));
        return Ok(expanded);
    }

    let default = cwd.join(DEFAULT_ARGS_FILE);
    if default.is_file() {
        let content = std::fs::read_to_string(&default)?;
        expanded.extend(parse_args_file(&content));
    }
    expanded.extend(rest);
    Ok(expanded)
}

/// Whitespace-separated tokens, with `#` comments running to end of line.
pub(crate) fn parse_args_file(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.split_once('#').map_or(line, |(before, _)| before))
        .flat_map(str::split_whitespace)
        .map(str::to_string)
        .collect()
}
