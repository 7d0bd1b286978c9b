//! Detaching the daemon from its launching session.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::DaemonError;

/// Abstraction over daemonisation strategies.
pub trait Daemonizer {
    /// Detach into the background, sending stdout and stderr to `log_file`.
    ///
    /// Returns only in the detached process.
    fn detach(&self, log_file: &Path) -> Result<(), DaemonError>;
}

/// Single-fork daemoniser for Unix.
///
/// The parent exits with code 0. The child moves to `/`, starts a new
/// session and redirects its output streams to the log file.
#[derive(Debug, Default)]
pub struct ForkDaemonizer;

impl ForkDaemonizer {
    /// Create a new fork daemoniser.
    pub fn new() -> Self {
        Self
    }
}

#[cfg(unix)]
impl Daemonizer for ForkDaemonizer {
    fn detach(&self, log_file: &Path) -> Result<(), DaemonError> {
        use nix::unistd::{chdir, dup2, fork, setsid, ForkResult};
        use std::os::unix::io::AsRawFd;

        info!("Daemonizing process (log file: {})...", log_file.display());

        // Opened before forking so a bad path fails in the foreground
        let log = open_log_file(log_file)?;
        let dev_null = File::open("/dev/null").map_err(|e| DaemonError::LogFile {
            path: PathBuf::from("/dev/null"),
            reason: e.to_string(),
        })?;

        // Safe as long as no other threads exist yet; the runtime is built
        // after this returns.
        match unsafe { fork() } {
            Ok(ForkResult::Parent { child }) => {
                info!("Backgrounded as PID {}", child);
                std::process::exit(0);
            }
            Ok(ForkResult::Child) => {}
            Err(e) => return Err(DaemonError::ForkFailed(e.to_string())),
        }

        // Do not pin whatever mount we were started from
        chdir("/").map_err(|e| DaemonError::ForkFailed(format!("chdir failed: {}", e)))?;

        setsid().map_err(|e| DaemonError::ForkFailed(format!("setsid failed: {}", e)))?;

        let redirect = |fd, target| {
            dup2(fd, target).map_err(|e| DaemonError::LogFile {
                path: log_file.to_path_buf(),
                reason: format!("dup2 onto fd {} failed: {}", target, e),
            })
        };
        redirect(dev_null.as_raw_fd(), 0)?;
        redirect(log.as_raw_fd(), 1)?;
        redirect(log.as_raw_fd(), 2)?;

        info!("Process daemonized (PID: {})", std::process::id());
        Ok(())
    }
}

#[cfg(not(unix))]
impl Daemonizer for ForkDaemonizer {
    fn detach(&self, _log_file: &Path) -> Result<(), DaemonError> {
        Err(DaemonError::ForkFailed(
            "daemonizing is not supported on this platform; use --foreground".to_string(),
        ))
    }
}

/// Open `path` for appending, creating it if needed.
pub fn open_log_file(path: &Path) -> Result<File, DaemonError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| DaemonError::LogFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_open_log_file_creates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("main_error.log");

        let mut file = open_log_file(&path).unwrap();
        writeln!(file, "first").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_open_log_file_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("main_error.log");
        std::fs::write(&path, "existing\n").unwrap();

        let mut file = open_log_file(&path).unwrap();
        writeln!(file, "appended").unwrap();
        drop(file);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "existing\nappended\n");
    }

    #[test]
    fn test_open_log_file_missing_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("no").join("such").join("dir.log");

        let err = open_log_file(&path).unwrap_err();
        assert!(matches!(err, DaemonError::LogFile { .. }));
    }
}
