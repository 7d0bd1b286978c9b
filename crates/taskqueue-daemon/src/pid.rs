//! PID file management for daemon processes.
//!
//! The pid file doubles as the single-instance lock. A record is written to
//! a private staging file and published with `hard_link`, which fails when
//! the target exists, so a visible record always holds a complete pid and
//! two racing processes cannot both publish. Stale records are moved aside
//! with `rename` before deletion so that a record published by someone else
//! in the meantime is never silently removed.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::DaemonError;

/// How many times `acquire` retries after reclaiming a stale record.
const MAX_ACQUIRE_ATTEMPTS: u32 = 3;

/// Contents of a pid file as found on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidRecord {
    /// No pid file at the path.
    Missing,
    /// The file names this process id.
    Owner(u32),
    /// The file exists but does not hold a pid.
    Invalid,
}

impl PidRecord {
    fn pid(self) -> Option<u32> {
        match self {
            PidRecord::Owner(pid) => Some(pid),
            _ => None,
        }
    }
}

/// Result of a conditional release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The record was deleted.
    Removed,
    /// There was nothing to delete.
    NotPresent,
    /// The record belongs to another live process and was left alone.
    Skipped { owner: u32 },
}

/// Handle on an acquired pid lock.
///
/// Dropping the handle performs the same conditional release as
/// [`PidFile::release`].
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
    pid: u32,
    released: bool,
}

impl PidFile {
    /// Claim the lock at `path` for the current process.
    ///
    /// Fails with [`DaemonError::AlreadyRunning`] when a live process owns
    /// the record. Records whose owner is gone, or which cannot be parsed,
    /// are reclaimed.
    pub fn acquire<P: AsRef<Path>>(path: P) -> Result<Self, DaemonError> {
        let path = path.as_ref().to_path_buf();
        let pid = std::process::id();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| DaemonError::PidFileCreation {
                path: path.clone(),
                reason: format!("Failed to create parent directory: {}", e),
            })?;
        }

        for attempt in 1..=MAX_ACQUIRE_ATTEMPTS {
            if publish(&path, pid)? {
                info!("PID file created: {} (PID: {})", path.display(), pid);
                return Ok(Self {
                    path,
                    pid,
                    released: false,
                });
            }

            match read_record(&path)? {
                // Removed between our link attempt and the read.
                PidRecord::Missing => continue,
                PidRecord::Owner(existing) if is_process_running(existing) => {
                    return Err(DaemonError::AlreadyRunning {
                        path,
                        pid: existing,
                    });
                }
                record => {
                    warn!(
                        "Removing stale PID file ({:?}, attempt {}): {}",
                        record,
                        attempt,
                        path.display()
                    );
                    remove_if_unchanged(&path, record)?;
                }
            }
        }

        Err(DaemonError::PidFileCreation {
            path,
            reason: format!("lock still contended after {} attempts", MAX_ACQUIRE_ATTEMPTS),
        })
    }

    /// Get the PID file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The pid this handle was acquired for.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Release the lock.
    ///
    /// The record is deleted only if it still names this process, or if
    /// the process it names is no longer alive.
    pub fn release(mut self) -> Result<ReleaseOutcome, DaemonError> {
        self.released = true;
        release_path(&self.path, self.pid)
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = release_path(&self.path, self.pid) {
                warn!("Failed to remove PID file on drop: {}", e);
            }
        }
    }
}

/// Read the record at `path` without interpreting liveness.
pub fn read_record(path: &Path) -> Result<PidRecord, DaemonError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(PidRecord::Missing),
        Err(e) => {
            return Err(DaemonError::PidFileRead {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        }
    };

    Ok(match contents.trim().parse::<u32>() {
        Ok(pid) if pid != 0 => PidRecord::Owner(pid),
        _ => PidRecord::Invalid,
    })
}

/// Return the pid of the live owner of `path`, if there is one.
///
/// Never modifies the record.
pub fn probe(path: &Path) -> Result<Option<u32>, DaemonError> {
    Ok(read_record(path)?
        .pid()
        .filter(|pid| is_process_running(*pid)))
}

/// Conditionally delete the record at `path` on behalf of process `me`.
///
/// Deletes when the record names `me`, names a dead process, or is
/// unparseable. A record naming another live process is left untouched.
pub fn release_path(path: &Path, me: u32) -> Result<ReleaseOutcome, DaemonError> {
    let record = read_record(path)?;
    match record {
        PidRecord::Missing => {
            debug!("PID file already gone: {}", path.display());
            Ok(ReleaseOutcome::NotPresent)
        }
        PidRecord::Owner(owner) if owner != me && is_process_running(owner) => {
            warn!(
                "Not removing PID file {} owned by live process {}",
                path.display(),
                owner
            );
            Ok(ReleaseOutcome::Skipped { owner })
        }
        record => {
            if remove_if_unchanged(path, record)? {
                info!("PID file removed: {}", path.display());
                Ok(ReleaseOutcome::Removed)
            } else {
                Ok(ReleaseOutcome::Skipped {
                    owner: read_record(path)?.pid().unwrap_or(0),
                })
            }
        }
    }
}

/// Check if a process with the given PID is running.
#[cfg(unix)]
pub fn is_process_running(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return false;
    }

    // Null signal: existence and permission check only
    match kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
pub fn is_process_running(_pid: u32) -> bool {
    // On non-Unix systems, assume process is running if we can't check
    true
}

/// A uniquely named file next to `path`, on the same filesystem.
fn sidecar(path: &Path, tag: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "pid".to_string());
    path.with_file_name(format!(
        ".{}.{}.{}.{}",
        name,
        std::process::id(),
        uuid::Uuid::new_v4().simple(),
        tag
    ))
}

/// Atomically create `path` holding `pid`. Returns false if it already exists.
fn publish(path: &Path, pid: u32) -> Result<bool, DaemonError> {
    let creation_error = |e: io::Error| DaemonError::PidFileCreation {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let staging = sidecar(path, "new");
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o644);
    }

    let written = options.open(&staging).and_then(|mut file| {
        writeln!(file, "{}", pid)?;
        file.sync_all()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&staging);
        return Err(creation_error(e));
    }

    let linked = fs::hard_link(&staging, path);
    let _ = fs::remove_file(&staging);
    match linked {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(creation_error(e)),
    }
}

/// Delete the record at `path` if it still matches `expected`.
///
/// Returns false when the record changed in between; the new record is
/// linked back into place.
fn remove_if_unchanged(path: &Path, expected: PidRecord) -> Result<bool, DaemonError> {
    let removal_error = |e: io::Error| DaemonError::PidFileRemoval {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let aside = sidecar(path, "stale");
    match fs::rename(path, &aside) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(removal_error(e)),
    }

    let found = read_record(&aside)?;
    if found == expected || found == PidRecord::Missing {
        fs::remove_file(&aside).map_err(removal_error)?;
        return Ok(true);
    }

    debug!(
        "PID file {} changed to {:?} while reclaiming, restoring",
        path.display(),
        found
    );
    restore_aside(path, &aside, found);
    Ok(false)
}

/// Link a record moved aside by mistake back to `path`.
///
/// If `path` was taken in the meantime the aside copy is kept, since it is
/// the only remaining trace of its owner's lock.
fn restore_aside(path: &Path, aside: &Path, found: PidRecord) -> bool {
    match fs::hard_link(aside, path) {
        Ok(()) => {
            let _ = fs::remove_file(aside);
            true
        }
        Err(e) => {
            match found.pid() {
                Some(owner) => warn!(
                    "PID {} lost its PID file {} ({}), record kept at {}",
                    owner,
                    path.display(),
                    e,
                    aside.display()
                ),
                None => warn!(
                    "Failed to restore PID file {} ({}), record kept at {}",
                    path.display(),
                    e,
                    aside.display()
                ),
            }
            false
        }
    }
}

#[cfg(test)]
#[path = "pid_tests.rs"]
mod tests;
