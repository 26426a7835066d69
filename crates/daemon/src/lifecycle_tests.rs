// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

#[test]
fn lock_is_exclusive_within_a_process() {
    let town = TempDir::new().unwrap();
    let config = Config::new(town.path().to_path_buf());

    let guard = acquire_lock(&config).unwrap();
    let second = acquire_lock(&config);
    assert!(matches!(second, Err(LifecycleError::LockFailed(_))));

    assert_eq!(
        lock_holder_pid(&config),
        Some(std::process::id().to_string())
    );
    drop(guard);
}

#[test]
fn rotation_shifts_old_logs() {
    let town = TempDir::new().unwrap();
    let log = town.path().join("gtd.log");
    std::fs::write(&log, vec![0u8; 11 * 1024 * 1024]).unwrap();
    std::fs::write(format!("{}.1", log.display()), b"old").unwrap();

    rotate_log_if_needed(&log);

    assert!(!log.exists());
    assert!(Path::new(&format!("{}.1", log.display())).exists());
    assert!(Path::new(&format!("{}.2", log.display())).exists());
}

#[test]
fn small_logs_are_left_alone() {
    let town = TempDir::new().unwrap();
    let log = town.path().join("gtd.log");
    std::fs::write(&log, b"tiny").unwrap();
    rotate_log_if_needed(&log);
    assert!(log.exists());
}
