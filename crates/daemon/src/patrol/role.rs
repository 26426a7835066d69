// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Role patrols: periodic check-ins on the persistent role agents.
//!
//! Disabled by default (opt-in via config). The core's job ends at
//! observing session liveness and logging; remediation belongs to the
//! agents themselves.

use super::{Patrol, PatrolError};
use async_trait::async_trait;
use gt_adapters::SessionAdapter;
use gt_core::Role;
use tokio_util::sync::CancellationToken;

pub struct RolePatrol<S: SessionAdapter> {
    role: Role,
    rigs: Vec<String>,
    sessions: S,
}

impl<S: SessionAdapter> RolePatrol<S> {
    pub fn new(role: Role, rigs: Vec<String>, sessions: S) -> Self {
        Self {
            role,
            rigs,
            sessions,
        }
    }

    /// Session IDs with a dead (or missing) session, by rig.
    pub async fn absent_sessions(&self) -> Vec<String> {
        let mut absent = Vec::new();
        for rig in &self.rigs {
            let session_id = format!("gt-{}-{}", rig, self.role);
            match self.sessions.is_alive(&session_id).await {
                Ok(true) => {}
                Ok(false) => absent.push(session_id),
                Err(e) => {
                    tracing::warn!(session = %session_id, error = %e, "liveness check failed");
                }
            }
        }
        absent
    }
}

#[async_trait]
impl<S: SessionAdapter> Patrol for RolePatrol<S> {
    fn name(&self) -> &'static str {
        match self.role {
            Role::Deacon => gt_core::PATROL_DEACON,
            Role::Refinery => gt_core::PATROL_REFINERY,
            _ => gt_core::PATROL_WITNESS,
        }
    }

    async fn run(&self, _cancel: &CancellationToken) -> Result<(), PatrolError> {
        let absent = self.absent_sessions().await;
        if absent.is_empty() {
            tracing::debug!(patrol = self.name(), "all role sessions alive");
        } else {
            tracing::warn!(
                patrol = self.name(),
                absent = %absent.join(", "),
                "role sessions missing"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "role_tests.rs"]
mod tests;
