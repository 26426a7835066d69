// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Issue-layer adapter: everything the core asks of the external `bd`
//! binary (work-unit lookup and mutation, molecule cook/pour, dependency
//! edges, wisp purges).

mod bd;

pub use bd::BdCli;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{BeadsCall, FakeBeads};

use async_trait::async_trait;
use gt_core::{AgentIdentity, Bead, BeadId, BeadStatus};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors from issue-layer operations.
#[derive(Debug, Error)]
pub enum BeadsError {
    #[error("bead not found: {0}")]
    NotFound(String),
    /// Lock-wait and connection hiccups; callers may retry with backoff.
    #[error("transient issue-layer error: {0}")]
    Transient(String),
    #[error("bd invocation failed: {0}")]
    Tool(String),
    #[error("unexpected bd output: {0}")]
    Json(String),
}

impl BeadsError {
    pub fn is_transient(&self) -> bool {
        matches!(self, BeadsError::Transient(_))
    }
}

/// Lifecycle states of an agent record bead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentBeadState {
    Spawning,
    Idle,
    Working,
}

impl AgentBeadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentBeadState::Spawning => "spawning",
            AgentBeadState::Idle => "idle",
            AgentBeadState::Working => "working",
        }
    }
}

impl fmt::Display for AgentBeadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Operations the core drives through the issue layer.
#[async_trait]
pub trait BeadsAdapter: Clone + Send + Sync + 'static {
    /// Look up a bead. `Ok(None)` when the ID does not exist.
    async fn show(&self, id: &BeadId) -> Result<Option<Bead>, BeadsError>;

    /// Create a bead (used for convoys). Returns the new ID.
    async fn create(
        &self,
        title: &str,
        description: &str,
        priority: i64,
    ) -> Result<BeadId, BeadsError>;

    async fn set_status(&self, id: &BeadId, status: BeadStatus) -> Result<(), BeadsError>;

    /// Replace the whole description. Callers must have read the current
    /// description first and merged their change into it.
    async fn update_description(&self, id: &BeadId, description: &str) -> Result<(), BeadsError>;

    async fn close(&self, id: &BeadId, reason: Option<&str>) -> Result<(), BeadsError>;

    /// Direct children of a bead (dependency edges out of it).
    async fn children(&self, id: &BeadId) -> Result<Vec<Bead>, BeadsError>;

    /// Record that `parent` tracks `child`.
    async fn add_dependency(&self, parent: &BeadId, child: &BeadId) -> Result<(), BeadsError>;

    /// Cook a formula into a reusable artifact reference.
    async fn cook_formula(&self, formula: &str) -> Result<String, BeadsError>;

    /// Instantiate a cooked formula standalone. Returns the root wisp ID.
    async fn pour(
        &self,
        cooked: &str,
        vars: &BTreeMap<String, String>,
    ) -> Result<BeadId, BeadsError>;

    /// Instantiate a cooked formula onto an existing work unit. Returns
    /// the attached molecule root ID.
    async fn attach_formula(&self, cooked: &str, bead: &BeadId) -> Result<BeadId, BeadsError>;

    /// Hook a bead to an agent.
    async fn hook(&self, id: &BeadId, owner: &AgentIdentity) -> Result<(), BeadsError>;

    /// Create an agent record bead in state `spawning`.
    async fn create_agent(&self, identity: &AgentIdentity) -> Result<BeadId, BeadsError>;

    async fn set_agent_state(
        &self,
        agent: &BeadId,
        state: AgentBeadState,
    ) -> Result<(), BeadsError>;

    /// Delete closed wisps older than `older_than` in `db`. Returns the
    /// purge count.
    async fn purge_closed_wisps(
        &self,
        db: &str,
        older_than: Duration,
        dry_run: bool,
    ) -> Result<u64, BeadsError>;
}
