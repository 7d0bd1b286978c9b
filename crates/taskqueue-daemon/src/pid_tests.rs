
    use super::*;
    use std::process::{Command, Stdio};
    use std::sync::{Arc, Barrier};
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn temp_pid_path() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("taskqueued.pid");
        (dir, path)
    }

    /// A pid that belonged to a process which has since exited and been reaped.
    fn dead_pid() -> u32 {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        // May already have been collected by a concurrent reap
        let _ = child.wait();
        pid
    }

    /// Names of everything in the directory except the pid file itself.
    fn leftovers(dir: &TempDir) -> Vec<String> {
        fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name != "taskqueued.pid")
            .collect()
    }

    #[test]
    fn test_acquire_new() {
        let (dir, path) = temp_pid_path();
        let pid = PidFile::acquire(&path).unwrap();

        assert_eq!(pid.path(), path.as_path());
        assert_eq!(pid.pid(), std::process::id());
        assert_eq!(read_record(&path).unwrap(), PidRecord::Owner(std::process::id()));
        assert!(leftovers(&dir).is_empty());
    }

    #[test]
    fn test_read_record_missing() {
        let (_dir, path) = temp_pid_path();
        assert_eq!(read_record(&path).unwrap(), PidRecord::Missing);
        assert_eq!(probe(&path).unwrap(), None);
    }

    #[test]
    fn test_read_record_invalid() {
        let (_dir, path) = temp_pid_path();
        fs::write(&path, "not a pid").unwrap();
        assert_eq!(read_record(&path).unwrap(), PidRecord::Invalid);

        fs::write(&path, "0\n").unwrap();
        assert_eq!(read_record(&path).unwrap(), PidRecord::Invalid);
    }

    #[test]
    fn test_acquire_fails_when_owner_alive() {
        let (_dir, path) = temp_pid_path();
        fs::write(&path, "1\n").unwrap();

        let err = PidFile::acquire(&path).unwrap_err();
        assert!(matches!(err, DaemonError::AlreadyRunning { pid: 1, .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "1\n");
    }

    #[test]
    fn test_acquire_reclaims_stale() {
        let (dir, path) = temp_pid_path();
        fs::write(&path, format!("{}\n", dead_pid())).unwrap();

        let pid = PidFile::acquire(&path).unwrap();
        assert_eq!(read_record(&path).unwrap(), PidRecord::Owner(pid.pid()));
        assert!(leftovers(&dir).is_empty());
    }

    #[test]
    fn test_acquire_reclaims_invalid() {
        let (_dir, path) = temp_pid_path();
        fs::write(&path, "garbage").unwrap();

        let pid = PidFile::acquire(&path).unwrap();
        assert_eq!(read_record(&path).unwrap(), PidRecord::Owner(pid.pid()));
    }

    #[test]
    fn test_concurrent_acquire_exactly_one_wins() {
        let (_dir, path) = temp_pid_path();
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let path = path.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    PidFile::acquire(&path)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners: Vec<_> = results.iter().filter(|r| r.is_ok()).collect();
        let losers: Vec<_> = results
            .iter()
            .filter(|r| matches!(r, Err(e) if e.is_already_running()))
            .collect();

        assert_eq!(winners.len(), 1);
        assert_eq!(losers.len(), 1);
        // The loser did not touch the winner's record
        assert_eq!(read_record(&path).unwrap(), PidRecord::Owner(std::process::id()));
    }

    #[test]
    fn test_release_removes_own_record() {
        let (_dir, path) = temp_pid_path();
        let pid = PidFile::acquire(&path).unwrap();

        assert_eq!(pid.release().unwrap(), ReleaseOutcome::Removed);
        assert!(!path.exists());
    }

    #[test]
    fn test_release_skips_live_foreign_owner() {
        let (_dir, path) = temp_pid_path();
        let pid = PidFile::acquire(&path).unwrap();

        // Another instance took over during a timing window
        fs::write(&path, "1\n").unwrap();

        assert_eq!(pid.release().unwrap(), ReleaseOutcome::Skipped { owner: 1 });
        assert_eq!(fs::read_to_string(&path).unwrap(), "1\n");
    }

    #[test]
    fn test_release_path_by_non_owner_is_noop() {
        let (_dir, path) = temp_pid_path();
        fs::write(&path, "1\n").unwrap();

        let outcome = release_path(&path, std::process::id()).unwrap();
        assert_eq!(outcome, ReleaseOutcome::Skipped { owner: 1 });
        assert_eq!(fs::read_to_string(&path).unwrap(), "1\n");
    }

    #[test]
    fn test_release_path_removes_dead_owner() {
        let (_dir, path) = temp_pid_path();
        fs::write(&path, format!("{}\n", dead_pid())).unwrap();

        let outcome = release_path(&path, std::process::id()).unwrap();
        assert_eq!(outcome, ReleaseOutcome::Removed);
        assert!(!path.exists());
    }

    #[test]
    fn test_release_missing() {
        let (_dir, path) = temp_pid_path();
        let outcome = release_path(&path, std::process::id()).unwrap();
        assert_eq!(outcome, ReleaseOutcome::NotPresent);
    }

    #[test]
    fn test_drop_releases_lock() {
        let (_dir, path) = temp_pid_path();
        {
            let _pid = PidFile::acquire(&path).unwrap();
            assert!(path.exists());
        } // PidFile dropped here

        assert!(!path.exists());
    }

    #[test]
    fn test_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("subdir").join("deep").join("taskqueued.pid");

        let _pid = PidFile::acquire(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_probe_reports_live_owner_only() {
        let (_dir, path) = temp_pid_path();
        fs::write(&path, "1\n").unwrap();
        assert_eq!(probe(&path).unwrap(), Some(1));

        fs::write(&path, format!("{}\n", dead_pid())).unwrap();
        assert_eq!(probe(&path).unwrap(), None);
        assert!(path.exists());
    }

    #[test]
    fn test_is_process_running() {
        assert!(is_process_running(std::process::id()));
        assert!(!is_process_running(0));
        assert!(!is_process_running(u32::MAX));
        assert!(!is_process_running(dead_pid()));
    

    #[test]
    fn test_restore_aside_relinks_record() {
        let (dir, path) = temp_pid_path();
        let aside = dir.path().join(".taskqueued.pid.stale");
        fs::write(&aside, "1\n").unwrap();

        assert!(restore_aside(&path, &aside, PidRecord::Owner(1)));
        assert_eq!(read_record(&path).unwrap(), PidRecord::Owner(1));
        assert!(!aside.exists());
    }

    #[test]
    fn test_restore_aside_keeps_record_when_path_taken() {
        let (dir, path) = temp_pid_path();
        let aside = dir.path().join(".taskqueued.pid.stale");
        fs::write(&aside, "1\n").unwrap();
        // Published by a third process while the record was set aside
        fs::write(&path, format!("{}\n", std::process::id())).unwrap();

        assert!(!restore_aside(&path, &aside, PidRecord::Owner(1)));
        assert_eq!(read_record(&path).unwrap(), PidRecord::Owner(std::process::id()));
        assert_eq!(read_record(&aside).unwrap(), PidRecord::Owner(1));
    }

    const CONTENDER_DIR_ENV: &str = "TASKQUEUED_CONTENDER_DIR";
    const CONTENDER_ID_ENV: &str = "TASKQUEUED_CONTENDER_ID";

    fn wait_for(path: &Path, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        while !path.exists() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    /// Body of a contender child process; a no-op in a normal test run.
    ///
    /// Waits for `go`, tries to acquire, reports through `result.{id}` and,
    /// when it won, holds the lock until `done` appears.
    #[test]
    fn test_acquire_contender_process() {
        let (Ok(dir), Ok(id)) = (
            std::env::var(CONTENDER_DIR_ENV),
            std::env::var(CONTENDER_ID_ENV),
        ) else {
            return;
        };
        let dir = PathBuf::from(dir);
        wait_for(&dir.join("go"), Duration::from_secs(10));

        let (outcome, lock) = match PidFile::acquire(dir.join("taskqueued.pid")) {
            Ok(lock) => (format!("won {}", std::process::id()), Some(lock)),
            Err(e) if e.is_already_running() => ("refused".to_string(), None),
            Err(e) => (format!("error {}", e), None),
        };
        let staged = dir.join(format!(".result.{}", id));
        fs::write(&staged, outcome).unwrap();
        fs::rename(&staged, dir.join(format!("result.{}", id))).unwrap();

        if lock.is_some() {
            wait_for(&dir.join("done"), Duration::from_secs(10));
        }
    }

    #[test]
    fn test_concurrent_processes_reclaim_stale_record_once() {
        const CONTENDERS: usize = 6;
        let exe = std::env::current_exe().unwrap();

        for _ in 0..3 {
            let (dir, path) = temp_pid_path();
            fs::write(&path, format!("{}\n", dead_pid())).unwrap();

            let mut children: Vec<_> = (0..CONTENDERS)
                .map(|id| {
                    Command::new(&exe)
                        .args([
                            "--exact",
                            "pid::tests::test_acquire_contender_process",
                            "--test-threads=1",
                        ])
                        .env(CONTENDER_DIR_ENV, dir.path())
                        .env(CONTENDER_ID_ENV, id.to_string())
                        .stdout(Stdio::null())
                        .stderr(Stdio::null())
                        .spawn()
                        .unwrap()
                })
                .collect();
            let child_pids: Vec<u32> = children.iter().map(|c| c.id()).collect();

            fs::write(dir.path().join("go"), "").unwrap();
            let results: Vec<String> = (0..CONTENDERS)
                .map(|id| {
                    let result = dir.path().join(format!("result.{}", id));
                    wait_for(&result, Duration::from_secs(30));
                    fs::read_to_string(&result).unwrap()
                })
                .collect();

            let winners: Vec<u32> = results
                .iter()
                .filter_map(|r| r.strip_prefix("won "))
                .map(|pid| pid.parse().unwrap())
                .collect();
            let refused = results.iter().filter(|r| *r == "refused").count();
            assert_eq!(winners.len(), 1, "results: {:?}", results);
            assert_eq!(refused, CONTENDERS - 1, "results: {:?}", results);

            // The record names the winning child, not this process
            assert!(child_pids.contains(&winners[0]));
            assert_eq!(read_record(&path).unwrap(), PidRecord::Owner(winners[0]));

            fs::write(dir.path().join("done"), "").unwrap();
            for child in &mut children {
                // May already have been collected by a concurrent reap
                let _ = child.wait();
            }
            assert_eq!(read_record(&path).unwrap(), PidRecord::Missing);
            assert!(
                leftovers(&dir)
                    .iter()
                    .all(|name| !name.starts_with(".taskqueued.pid")),
                "leftovers: {:?}",
                leftovers(&dir)
            );
        }
    }
}
