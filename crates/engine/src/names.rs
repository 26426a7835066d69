// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Themed polecat name pool, one per rig.
//!
//! Claim/release under a mutex; state is persisted after each mutation
//! so a daemon restart does not hand out names still bound to live
//! sessions. Persistence is best-effort (a read-only disk must not stop
//! spawning).

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Default theme when a rig has no pool file yet.
pub const DEFAULT_THEME: &[&str] = &[
    "ace", "capable", "cheedo", "dag", "furiosa", "morsov", "nux", "rictus", "scrotus", "slit",
    "toast", "valkyrie",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PoolState {
    theme: Vec<String>,
    in_use: BTreeSet<String>,
    /// Counter for overflow names once the theme is exhausted.
    #[serde(default)]
    overflow: u64,
}

impl Default for PoolState {
    fn default() -> Self {
        Self {
            theme: DEFAULT_THEME.iter().map(|s| s.to_string()).collect(),
            in_use: BTreeSet::new(),
            overflow: 0,
        }
    }
}

/// Mutex-protected name pool persisted at a fixed path.
pub struct NamePool {
    path: PathBuf,
    state: Mutex<PoolState>,
}

impl NamePool {
    /// Load the pool from `path`, falling back to the default theme.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = std::fs::read_to_string(&path)
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default();
        Self {
            path,
            state: Mutex::new(state),
        }
    }

    /// Claim a name. Theme names go first; once exhausted, numbered
    /// overflow names keep spawns moving.
    pub fn claim(&self) -> String {
        let mut state = self.state.lock();
        let name = match state
            .theme
            .iter()
            .find(|n| !state.in_use.contains(*n))
            .cloned()
        {
            Some(name) => name,
            None => {
                state.overflow += 1;
                format!("spare-{}", state.overflow)
            }
        };
        state.in_use.insert(name.clone());
        self.persist(&state);
        name
    }

    /// Return a name to the pool.
    pub fn release(&self, name: &str) {
        let mut state = self.state.lock();
        if state.in_use.remove(name) {
            self.persist(&state);
        }
    }

    /// Names currently bound to sessions.
    pub fn in_use(&self) -> BTreeSet<String> {
        self.state.lock().in_use.clone()
    }

    fn persist(&self, state: &PoolState) {
        let write = || -> std::io::Result<()> {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let text = serde_json::to_string_pretty(state)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            std::fs::write(&self.path, text)
        };
        if let Err(e) = write() {
            tracing::warn!(path = %self.path.display(), error = %e, "name pool persist failed");
        }
    }
}

#[cfg(test)]
#[path = "names_tests.rs"]
mod tests;
