// Integration tests for the session runner and instance lock
// These tests drive real inotify sessions over temporary directories

#![cfg(target_os = "linux")]

use pathtrail::{run_session, InstanceLock};
use pathtrail_core::MonitorConfig;
use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn session_config(temp_dir: &TempDir, roots: Vec<PathBuf>) -> MonitorConfig {
    MonitorConfig {
        log_path: temp_dir.path().join("access.log"),
        poll_timeout_ms: 50,
        roots,
        lock_path: temp_dir.path().join("pathtrail.lock"),
        ..MonitorConfig::default()
    }
}

#[test]
fn test_cancelled_session_leaves_log_untouched() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("root");
    fs::create_dir(&root).unwrap();
    let config = session_config(&temp_dir, vec![root]);
    fs::write(&config.log_path, "/already/seen\n").unwrap();

    let shutdown = CancellationToken::new();
    shutdown.cancel();
    let stats = run_session(&config, shutdown).unwrap();

    assert_eq!(stats.paths_recorded, 0);
    assert_eq!(
        fs::read_to_string(&config.log_path).unwrap(),
        "/already/seen\n"
    );
}

#[test]
fn test_session_flushes_accesses_on_shutdown() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("root");
    fs::create_dir(&root).unwrap();
    let config = session_config(&temp_dir, vec![root.clone()]);
    let log_path = config.log_path.clone();

    let shutdown = CancellationToken::new();
    let session = thread::spawn({
        let shutdown = shutdown.clone();
        move || run_session(&config, shutdown)
    });

    // Give the session time to install its watches
    thread::sleep(Duration::from_millis(500));
    let file = root.join("touched.txt");
    fs::write(&file, b"data").unwrap();
    fs::read(&file).unwrap();
    thread::sleep(Duration::from_millis(500));

    shutdown.cancel();
    let stats = session.join().unwrap().unwrap();

    assert_eq!(stats.paths_recorded, 1);
    assert_eq!(
        fs::read_to_string(&log_path).unwrap(),
        format!("{}\n", file.display())
    );
}

#[test]
fn test_unwritable_log_location_fails_session_start() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = session_config(&temp_dir, vec![temp_dir.path().to_path_buf()]);
    // A directory where the log should be cannot be read as a log
    config.log_path = temp_dir.path().to_path_buf();

    let result = run_session(&config, CancellationToken::new());
    assert!(result.is_err());
}

#[test]
fn test_lock_is_exclusive_until_dropped() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("run/pathtrail.lock");

    let first = InstanceLock::acquire(&path).unwrap();
    assert!(InstanceLock::acquire(&path).is_err());

    drop(first);
    assert!(InstanceLock::acquire(&path).is_ok());
}
