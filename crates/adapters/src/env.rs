// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the adapters crate.

use std::time::Duration;

fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Agent-log tail poll interval (default: 500ms). The polling interval is
/// part of the adapter contract; file-notification backends are not used.
pub fn tail_poll_ms() -> Duration {
    parse_duration_ms("GT_TAIL_POLL_MS").unwrap_or(Duration::from_millis(500))
}

/// How long to wait for a session log to appear before resetting the
/// mtime floor (default: 30s).
pub fn tail_wait_for_file() -> Duration {
    parse_duration_ms("GT_TAIL_WAIT_MS").unwrap_or(Duration::from_secs(30))
}

/// Path of the issue-layer binary (default: "bd").
pub fn bd_binary() -> String {
    std::env::var("GT_BD_BIN").unwrap_or_else(|_| "bd".to_string())
}
