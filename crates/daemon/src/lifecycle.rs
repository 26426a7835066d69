// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup: paths, the single-instance lock, log rotation.

use fs2::FileExt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("another gtd already holds the lock")]
    LockFailed(std::io::Error),
    #[error("configuration error: {0}")]
    Config(String),
}

/// Resolved daemon paths.
#[derive(Debug, Clone)]
pub struct Config {
    pub town_root: PathBuf,
    pub log_path: PathBuf,
    pub lock_path: PathBuf,
}

impl Config {
    pub fn new(town_root: PathBuf) -> Self {
        let daemon_dir = town_root.join("daemon");
        Self {
            log_path: daemon_dir.join("gtd.log"),
            lock_path: daemon_dir.join("gtd.lock"),
            town_root,
        }
    }

    pub fn load() -> Result<Self, LifecycleError> {
        Ok(Self::new(crate::env::town_root()))
    }
}

/// Holds the advisory lock for the process lifetime.
pub struct LockGuard {
    _file: File,
}

/// Take the single-instance lock, writing our PID into the lock file.
pub fn acquire_lock(config: &Config) -> Result<LockGuard, LifecycleError> {
    if let Some(parent) = config.lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&config.lock_path)?;
    file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
    file.set_len(0)?;
    writeln!(file, "{}", std::process::id())?;
    Ok(LockGuard { _file: file })
}

/// PID recorded in the lock file, if readable.
pub fn lock_holder_pid(config: &Config) -> Option<String> {
    let pid = std::fs::read_to_string(&config.lock_path).ok()?;
    let pid = pid.trim().to_string();
    (!pid.is_empty()).then_some(pid)
}

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep (gtd.log.1, .2, .3).
const MAX_ROTATED_LOGS: u32 = 3;

/// Rotate the daemon log file if it exceeds [`MAX_LOG_SIZE`].
///
/// Shifts `gtd.log` → `gtd.log.1` → `gtd.log.2` → `gtd.log.3`, deleting
/// the oldest. Best-effort: rotation failures are silently ignored so
/// the daemon still starts.
pub fn rotate_log_if_needed(log_path: &Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };

    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();

    // Shift older rotations: .3 is deleted, .2→.3, .1→.2
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    // Rotate current log → .1
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
