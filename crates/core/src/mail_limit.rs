// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session mail rate limiting, keyed by agent role.
//!
//! Counters live in one tiny JSON file per session ID under a shared temp
//! directory, so limits survive process restarts within a session but
//! never contend across sessions.

use crate::error::CoreError;
use crate::identity::Role;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the counter directory under the system temp dir.
const RATELIMIT_DIR: &str = "gt-mail-ratelimit";

/// What a role class is allowed to send per session.
///
/// Kept as data: changing a role's budget (e.g. splitting `crew` off from
/// `polecat`) is a table edit, not a logic change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailPolicy {
    Unlimited,
    Blocked,
    Limit(u32),
}

/// The rate-limit table. `crew` matches `polecat` for now.
pub fn policy_for(role: Role) -> MailPolicy {
    match role {
        Role::Mayor => MailPolicy::Unlimited,
        Role::Dog | Role::Boot => MailPolicy::Blocked,
        Role::Deacon => MailPolicy::Limit(3),
        Role::Polecat => MailPolicy::Limit(1),
        Role::Crew => MailPolicy::Limit(1),
        Role::Witness | Role::Refinery => MailPolicy::Limit(5),
        Role::Unknown => MailPolicy::Blocked,
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CounterFile {
    count: u32,
}

/// File-backed per-session mail counter.
#[derive(Debug, Clone)]
pub struct MailLimiter {
    dir: PathBuf,
}

impl Default for MailLimiter {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl MailLimiter {
    /// Create a limiter rooted at `tmp/gt-mail-ratelimit`.
    pub fn new(tmp: impl AsRef<Path>) -> Self {
        Self {
            dir: tmp.as_ref().join(RATELIMIT_DIR),
        }
    }

    /// Check whether `role` may send another mail in `session_id`, and
    /// record the send if so. Returns `Ok(true)` when the send is allowed.
    pub fn allow_send(&self, role: Role, session_id: &str) -> Result<bool, CoreError> {
        match policy_for(role) {
            MailPolicy::Unlimited => Ok(true),
            MailPolicy::Blocked => Ok(false),
            MailPolicy::Limit(cap) => {
                let path = self.counter_path(session_id);
                let mut state = read_counter(&path);
                if state.count >= cap {
                    return Ok(false);
                }
                state.count += 1;
                self.write_counter(&path, &state)?;
                Ok(true)
            }
        }
    }

    /// Current count for a session (0 when no file exists).
    pub fn count(&self, session_id: &str) -> u32 {
        read_counter(&self.counter_path(session_id)).count
    }

    /// Drop a session's counter (e.g. when the session is recycled).
    pub fn reset(&self, session_id: &str) {
        let _ = std::fs::remove_file(self.counter_path(session_id));
    }

    fn counter_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize(session_id)))
    }

    fn write_counter(&self, path: &Path, state: &CounterFile) -> Result<(), CoreError> {
        std::fs::create_dir_all(&self.dir)?;
        let text = serde_json::to_string(state).map_err(|e| CoreError::Config(e.to_string()))?;
        std::fs::write(path, text)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }
}

fn read_counter(path: &Path) -> CounterFile {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|t| serde_json::from_str(&t).ok())
        .unwrap_or_default()
}

/// Session IDs contain slashes (`rig/name`); keep the filename flat.
fn sanitize(session_id: &str) -> String {
    session_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "mail_limit_tests.rs"]
mod tests;
