// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the engine crate.

use std::time::Duration;

fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Pause between consecutive spawns in a batch (default: 2000ms).
/// Spreads out issue-layer writes so spawns don't fight over locks.
pub fn sling_spawn_delay() -> Duration {
    parse_duration_ms("GT_SLING_DELAY_MS").unwrap_or(Duration::from_secs(2))
}

/// Admission-control pause after every `max_concurrent` successes
/// (default: 6000ms). Time-based relaxation, not precise counting:
/// polecats become autonomous within seconds of spawning.
pub fn sling_relax_delay() -> Duration {
    parse_duration_ms("GT_SLING_RELAX_MS").unwrap_or(Duration::from_secs(6))
}

/// Base backoff for hook retries on transient lock errors (default: 500ms).
pub fn hook_retry_base() -> Duration {
    parse_duration_ms("GT_HOOK_RETRY_MS").unwrap_or(Duration::from_millis(500))
}
