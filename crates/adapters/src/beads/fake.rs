// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake issue-layer adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{AgentBeadState, BeadsAdapter, BeadsError};
use async_trait::async_trait;
use gt_core::{AgentIdentity, Bead, BeadId, BeadStatus};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

/// Recorded issue-layer call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeadsCall {
    Show(String),
    Create { title: String },
    SetStatus { id: String, status: BeadStatus },
    UpdateDescription { id: String },
    Close { id: String, reason: Option<String> },
    Children(String),
    AddDependency { parent: String, child: String },
    Cook(String),
    Pour { cooked: String },
    Attach { cooked: String, bead: String },
    Hook { id: String, owner: String },
    CreateAgent { session: String },
    SetAgentState { id: String, state: String },
    PurgeWisps { db: String, dry_run: bool },
}

#[derive(Default)]
struct FakeBeadsState {
    beads: BTreeMap<String, Bead>,
    children: BTreeMap<String, Vec<String>>,
    formulas: BTreeMap<String, Vec<String>>,
    agent_states: BTreeMap<String, String>,
    close_reasons: BTreeMap<String, Option<String>>,
    calls: Vec<BeadsCall>,
    next_id: u64,
    fail_cook: bool,
    fail_pour: bool,
    fail_attach: bool,
    hook_failures_remaining: u32,
    fail_dep_children: BTreeSet<String>,
    purge_counts: BTreeMap<String, u64>,
    purge_failures: BTreeSet<String>,
}

/// Fake issue-layer adapter for testing.
#[derive(Clone, Default)]
pub struct FakeBeads {
    inner: Arc<Mutex<FakeBeadsState>>,
}

impl FakeBeads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a bead.
    pub fn insert(&self, bead: Bead) {
        self.inner.lock().beads.insert(bead.id.to_string(), bead);
    }

    /// Register a formula's step titles; `pour`/`attach_formula` create
    /// one child wisp per step.
    pub fn register_formula(&self, name: &str, steps: &[&str]) {
        self.inner
            .lock()
            .formulas
            .insert(name.to_string(), steps.iter().map(|s| s.to_string()).collect());
    }

    pub fn set_fail_cook(&self, fail: bool) {
        self.inner.lock().fail_cook = fail;
    }

    pub fn set_fail_pour(&self, fail: bool) {
        self.inner.lock().fail_pour = fail;
    }

    pub fn set_fail_attach(&self, fail: bool) {
        self.inner.lock().fail_attach = fail;
    }

    /// Make the next `n` hook calls fail with a transient error.
    pub fn set_hook_transient_failures(&self, n: u32) {
        self.inner.lock().hook_failures_remaining = n;
    }

    /// Make dependency-edge creation fail for a specific child.
    pub fn fail_dep_for(&self, child: &str) {
        self.inner.lock().fail_dep_children.insert(child.to_string());
    }

    pub fn set_purge_count(&self, db: &str, count: u64) {
        self.inner.lock().purge_counts.insert(db.to_string(), count);
    }

    pub fn fail_purge_for(&self, db: &str) {
        self.inner.lock().purge_failures.insert(db.to_string());
    }

    pub fn bead(&self, id: &str) -> Option<Bead> {
        self.inner.lock().beads.get(id).cloned()
    }

    pub fn status_of(&self, id: &str) -> Option<BeadStatus> {
        self.inner.lock().beads.get(id).map(|b| b.status)
    }

    pub fn agent_state(&self, id: &str) -> Option<String> {
        self.inner.lock().agent_states.get(id).cloned()
    }

    pub fn close_reason(&self, id: &str) -> Option<Option<String>> {
        self.inner.lock().close_reasons.get(id).cloned()
    }

    pub fn child_ids(&self, id: &str) -> Vec<String> {
        self.inner.lock().children.get(id).cloned().unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<BeadsCall> {
        self.inner.lock().calls.clone()
    }

    pub fn call_count(&self, matcher: impl Fn(&BeadsCall) -> bool) -> usize {
        self.inner.lock().calls.iter().filter(|c| matcher(c)).count()
    }
}

impl FakeBeadsState {
    fn next(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{:04}", prefix, self.next_id)
    }

    fn make_molecule(&mut self, formula_steps: Vec<String>) -> String {
        let root_id = self.next("mol");
        self.beads.insert(
            root_id.clone(),
            Bead {
                id: BeadId::new(root_id.clone()),
                title: "molecule root".to_string(),
                status: BeadStatus::Hooked,
                priority: 2,
                description: String::new(),
            },
        );
        let mut child_ids = Vec::new();
        for title in formula_steps {
            let child_id = self.next("mol");
            self.beads.insert(
                child_id.clone(),
                Bead {
                    id: BeadId::new(child_id.clone()),
                    title,
                    status: BeadStatus::Open,
                    priority: 2,
                    description: String::new(),
                },
            );
            child_ids.push(child_id);
        }
        self.children.insert(root_id.clone(), child_ids);
        root_id
    }
}

#[async_trait]
impl BeadsAdapter for FakeBeads {
    async fn show(&self, id: &BeadId) -> Result<Option<Bead>, BeadsError> {
        let mut inner = self.inner.lock();
        inner.calls.push(BeadsCall::Show(id.to_string()));
        Ok(inner.beads.get(id.as_str()).cloned())
    }

    async fn create(
        &self,
        title: &str,
        description: &str,
        priority: i64,
    ) -> Result<BeadId, BeadsError> {
        let mut inner = self.inner.lock();
        inner.calls.push(BeadsCall::Create {
            title: title.to_string(),
        });
        let id = inner.next("hq");
        inner.beads.insert(
            id.clone(),
            Bead {
                id: BeadId::new(id.clone()),
                title: title.to_string(),
                status: BeadStatus::Open,
                priority,
                description: description.to_string(),
            },
        );
        Ok(BeadId::new(id))
    }

    async fn set_status(&self, id: &BeadId, status: BeadStatus) -> Result<(), BeadsError> {
        let mut inner = self.inner.lock();
        inner.calls.push(BeadsCall::SetStatus {
            id: id.to_string(),
            status,
        });
        match inner.beads.get_mut(id.as_str()) {
            Some(bead) => {
                bead.status = status;
                Ok(())
            }
            None => Err(BeadsError::NotFound(id.to_string())),
        }
    }

    async fn update_description(&self, id: &BeadId, description: &str) -> Result<(), BeadsError> {
        let mut inner = self.inner.lock();
        inner
            .calls
            .push(BeadsCall::UpdateDescription { id: id.to_string() });
        match inner.beads.get_mut(id.as_str()) {
            Some(bead) => {
                bead.description = description.to_string();
                Ok(())
            }
            None => Err(BeadsError::NotFound(id.to_string())),
        }
    }

    async fn close(&self, id: &BeadId, reason: Option<&str>) -> Result<(), BeadsError> {
        let mut inner = self.inner.lock();
        inner.calls.push(BeadsCall::Close {
            id: id.to_string(),
            reason: reason.map(String::from),
        });
        inner
            .close_reasons
            .insert(id.to_string(), reason.map(String::from));
        match inner.beads.get_mut(id.as_str()) {
            Some(bead) => {
                bead.status = BeadStatus::Closed;
                Ok(())
            }
            None => Err(BeadsError::NotFound(id.to_string())),
        }
    }

    async fn children(&self, id: &BeadId) -> Result<Vec<Bead>, BeadsError> {
        let mut inner = self.inner.lock();
        inner.calls.push(BeadsCall::Children(id.to_string()));
        let ids = inner.children.get(id.as_str()).cloned().unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|cid| inner.beads.get(cid).cloned())
            .collect())
    }

    async fn add_dependency(&self, parent: &BeadId, child: &BeadId) -> Result<(), BeadsError> {
        let mut inner = self.inner.lock();
        inner.calls.push(BeadsCall::AddDependency {
            parent: parent.to_string(),
            child: child.to_string(),
        });
        if inner.fail_dep_children.contains(child.as_str()) {
            return Err(BeadsError::Tool(format!("dep add failed for {}", child)));
        }
        inner
            .children
            .entry(parent.to_string())
            .or_default()
            .push(child.to_string());
        Ok(())
    }

    async fn cook_formula(&self, formula: &str) -> Result<String, BeadsError> {
        let mut inner = self.inner.lock();
        inner.calls.push(BeadsCall::Cook(formula.to_string()));
        if inner.fail_cook {
            return Err(BeadsError::Tool(format!("cook failed for {}", formula)));
        }
        if !inner.formulas.contains_key(formula) {
            return Err(BeadsError::NotFound(format!("formula {}", formula)));
        }
        Ok(format!("cooked:{}", formula))
    }

    async fn pour(
        &self,
        cooked: &str,
        _vars: &BTreeMap<String, String>,
    ) -> Result<BeadId, BeadsError> {
        let mut inner = self.inner.lock();
        inner.calls.push(BeadsCall::Pour {
            cooked: cooked.to_string(),
        });
        if inner.fail_pour {
            return Err(BeadsError::Tool("pour failed".to_string()));
        }
        let name = cooked.strip_prefix("cooked:").unwrap_or(cooked);
        let steps = inner.formulas.get(name).cloned().unwrap_or_default();
        Ok(BeadId::new(inner.make_molecule(steps)))
    }

    async fn attach_formula(&self, cooked: &str, bead: &BeadId) -> Result<BeadId, BeadsError> {
        let mut inner = self.inner.lock();
        inner.calls.push(BeadsCall::Attach {
            cooked: cooked.to_string(),
            bead: bead.to_string(),
        });
        if inner.fail_attach {
            return Err(BeadsError::Tool("attach failed".to_string()));
        }
        if !inner.beads.contains_key(bead.as_str()) {
            return Err(BeadsError::NotFound(bead.to_string()));
        }
        let name = cooked.strip_prefix("cooked:").unwrap_or(cooked);
        let steps = inner.formulas.get(name).cloned().unwrap_or_default();
        Ok(BeadId::new(inner.make_molecule(steps)))
    }

    async fn hook(&self, id: &BeadId, owner: &AgentIdentity) -> Result<(), BeadsError> {
        let mut inner = self.inner.lock();
        inner.calls.push(BeadsCall::Hook {
            id: id.to_string(),
            owner: owner.handle(),
        });
        if inner.hook_failures_remaining > 0 {
            inner.hook_failures_remaining -= 1;
            return Err(BeadsError::Transient("database is locked".to_string()));
        }
        match inner.beads.get_mut(id.as_str()) {
            Some(bead) => {
                bead.status = BeadStatus::Hooked;
                Ok(())
            }
            None => Err(BeadsError::NotFound(id.to_string())),
        }
    }

    async fn create_agent(&self, identity: &AgentIdentity) -> Result<BeadId, BeadsError> {
        let mut inner = self.inner.lock();
        inner.calls.push(BeadsCall::CreateAgent {
            session: identity.session.clone(),
        });
        let id = inner.next("agt");
        inner.beads.insert(
            id.clone(),
            Bead {
                id: BeadId::new(id.clone()),
                title: format!("agent {}", identity.handle()),
                status: BeadStatus::Open,
                priority: 2,
                description: String::new(),
            },
        );
        inner
            .agent_states
            .insert(id.clone(), AgentBeadState::Spawning.as_str().to_string());
        Ok(BeadId::new(id))
    }

    async fn set_agent_state(
        &self,
        agent: &BeadId,
        state: AgentBeadState,
    ) -> Result<(), BeadsError> {
        let mut inner = self.inner.lock();
        inner.calls.push(BeadsCall::SetAgentState {
            id: agent.to_string(),
            state: state.as_str().to_string(),
        });
        inner
            .agent_states
            .insert(agent.to_string(), state.as_str().to_string());
        Ok(())
    }

    async fn purge_closed_wisps(
        &self,
        db: &str,
        _older_than: Duration,
        dry_run: bool,
    ) -> Result<u64, BeadsError> {
        let mut inner = self.inner.lock();
        inner.calls.push(BeadsCall::PurgeWisps {
            db: db.to_string(),
            dry_run,
        });
        if inner.purge_failures.contains(db) {
            return Err(BeadsError::Tool(format!("purge failed for {}", db)));
        }
        Ok(inner.purge_counts.get(db).copied().unwrap_or(0))
    }
}
