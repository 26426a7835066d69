// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon.

use gt_store::StoreConfig;
use std::path::PathBuf;

/// Town root: `GT_TOWN_ROOT`, else `~/gt`.
pub fn town_root() -> PathBuf {
    std::env::var("GT_TOWN_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs::home_dir().unwrap_or_default().join("gt"))
}

/// Store connection parameters with `GT_STORE_*` overrides.
pub fn store_config() -> StoreConfig {
    let mut config = StoreConfig::default();
    if let Ok(host) = std::env::var("GT_STORE_HOST") {
        config.host = host;
    }
    if let Ok(port) = std::env::var("GT_STORE_PORT") {
        if let Ok(port) = port.parse() {
            config.port = port;
        }
    }
    if let Ok(user) = std::env::var("GT_STORE_USER") {
        config.user = user;
    }
    if let Ok(password) = std::env::var("GT_STORE_PASSWORD") {
        config.password = password;
    }
    config
}

/// Tick period for the scheduled-maintenance window check (default 60s).
pub fn maintenance_tick_secs() -> u64 {
    std::env::var("GT_MAINTENANCE_TICK_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(60)
}
