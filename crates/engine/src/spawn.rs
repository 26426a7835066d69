// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Polecat spawn pipeline.
//!
//! A spawn is a sequence of steps against four external systems (issue
//! layer, git, the versioned store, tmux). Each completed step pushes a
//! compensation onto an undo stack; any failure runs the stack in
//! reverse, best-effort, so a half-spawned polecat never leaks a name,
//! a work-tree, or a dangling hook. No step throws: every outcome is a
//! `Result`.

use crate::env;
use crate::names::NamePool;
use crate::town::TownContext;
use async_trait::async_trait;
use gt_adapters::{AgentBeadState, BeadsAdapter, BeadsError, SessionAdapter};
use gt_core::{attachment, AgentIdentity, AttachmentField, BeadId, BeadStatus};
use gt_store::StoreClient;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Hook/idle retry budget for transient lock errors.
const RETRY_ATTEMPTS: u32 = 3;

/// Work-tree operations, separated for tests (real work-trees need git).
#[async_trait]
pub trait WorktreeOps: Clone + Send + Sync + 'static {
    async fn create(
        &self,
        repo: &Path,
        worktree: &Path,
        branch: &str,
        base: &str,
    ) -> Result<(), String>;
    async fn remove(&self, repo: &Path, worktree: &Path) -> Result<(), String>;
}

/// Real work-trees via the git adapter.
#[derive(Clone, Default)]
pub struct GitWorktrees;

#[async_trait]
impl WorktreeOps for GitWorktrees {
    async fn create(
        &self,
        repo: &Path,
        worktree: &Path,
        branch: &str,
        base: &str,
    ) -> Result<(), String> {
        gt_adapters::git::worktree_add(repo, worktree, branch, base).await
    }

    async fn remove(&self, repo: &Path, worktree: &Path) -> Result<(), String> {
        gt_adapters::git::worktree_remove(repo, worktree).await
    }
}

/// Store-branch operations for polecat isolation branches.
#[async_trait]
pub trait BranchOps: Clone + Send + Sync + 'static {
    async fn create_branch(&self, db: &str, name: &str) -> Result<(), String>;
    async fn delete_branch(&self, db: &str, name: &str) -> Result<(), String>;
}

/// Real store branches via the pooled client.
#[derive(Clone)]
pub struct StoreBranches(pub StoreClient);

#[async_trait]
impl BranchOps for StoreBranches {
    async fn create_branch(&self, db: &str, name: &str) -> Result<(), String> {
        self.0
            .create_branch(db, name, self.0.config().write_deadline())
            .await
            .map_err(|e| e.to_string())
    }

    async fn delete_branch(&self, db: &str, name: &str) -> Result<(), String> {
        self.0
            .delete_branch(db, name, self.0.config().write_deadline())
            .await
            .map_err(|e| e.to_string())
    }
}

/// Errors a spawn can surface. Variants with actionable alternatives
/// render them through [`SpawnError::options`].
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("bead not found: {0}")]
    NotFound(BeadId),
    #[error("unknown rig: {0}")]
    UnknownRig(String),
    #[error("bead {bead} belongs to rig '{owner_rig}', not '{target_rig}'")]
    CrossRig {
        bead: BeadId,
        owner_rig: String,
        target_rig: String,
    },
    #[error("bead {0} already has a molecule attached")]
    HasMolecules(BeadId),
    #[error("work-tree creation failed: {0}")]
    Worktree(String),
    #[error("formula cook failed for {formula}: {message}")]
    Cook { formula: String, message: String },
    #[error("hook failed after {RETRY_ATTEMPTS} attempts: {0}")]
    Hook(BeadsError),
    #[error("store branch creation failed: {0}")]
    Branch(String),
    #[error("session start failed: {0}")]
    Session(String),
    #[error(transparent)]
    Beads(#[from] BeadsError),
}

impl SpawnError {
    /// Numbered alternatives for the interactive `Options:` block.
    pub fn options(&self) -> Vec<String> {
        match self {
            SpawnError::CrossRig {
                bead, owner_rig, ..
            } => vec![
                format!("Remove {} from the batch", bead),
                format!("Sling it to its own rig: gt sling {} {}", bead, owner_rig),
                "Pass --force to override the rig guard".to_string(),
            ],
            SpawnError::HasMolecules(bead) => vec![
                format!("Pass --force to burn the existing molecules on {}", bead),
                format!("Spawn without a formula: gt sling {} <rig>", bead),
            ],
            _ => Vec::new(),
        }
    }
}

/// Convoy context handed down by the batch dispatcher.
#[derive(Debug, Clone)]
pub struct ConvoyRef {
    pub id: BeadId,
    /// Units whose dependency edge actually landed. A bead is stamped
    /// with the convoy ID only when it appears here.
    pub tracked: BTreeSet<BeadId>,
    /// True when this spawn is the convoy's only contributor; rollback
    /// then closes the convoy too.
    pub sole_contributor: bool,
}

/// Options for one spawn.
#[derive(Debug, Clone, Default)]
pub struct SpawnOptions {
    pub force: bool,
    pub base_branch: Option<String>,
    pub agent_type: Option<String>,
    pub formula: Option<String>,
    /// Pre-cooked artifact from the dispatcher; cooked on demand when
    /// absent and `formula` is set.
    pub cooked: Option<String>,
    /// Batch mode degrades cook failures to warnings.
    pub batch_mode: bool,
    pub dispatcher: Option<String>,
    pub args: Vec<String>,
    pub merge_strategy: Option<String>,
    pub no_merge: bool,
    pub convoy: Option<ConvoyRef>,
}

/// What a successful spawn produced.
#[derive(Debug, Clone)]
pub struct SpawnOutcome {
    pub bead: BeadId,
    pub polecat: String,
    pub session: String,
    pub work_tree: PathBuf,
    pub molecule: Option<BeadId>,
    pub agent_record: BeadId,
}

/// Compensation for one completed step, run in reverse on failure.
enum Undo {
    ResetStatus { bead: BeadId, status: BeadStatus },
    ClearMoleculeStamp { bead: BeadId },
    CloseMolecule { root: BeadId },
    CloseAgentRecord { agent: BeadId },
    ReleaseName { name: String },
    RemoveWorktree { repo: PathBuf, path: PathBuf },
    DeleteBranch { db: String, name: String },
    CloseConvoy { convoy: BeadId },
}

/// The spawn pipeline. Generic over its four external seams.
pub struct SpawnPipeline<B, S, W, R>
where
    B: BeadsAdapter,
    S: SessionAdapter,
    W: WorktreeOps,
    R: BranchOps,
{
    beads: B,
    sessions: S,
    worktrees: W,
    branches: R,
    names: Arc<NamePool>,
    town: Arc<TownContext>,
}

impl<B, S, W, R> SpawnPipeline<B, S, W, R>
where
    B: BeadsAdapter,
    S: SessionAdapter,
    W: WorktreeOps,
    R: BranchOps,
{
    pub fn new(
        beads: B,
        sessions: S,
        worktrees: W,
        branches: R,
        names: Arc<NamePool>,
        town: Arc<TownContext>,
    ) -> Self {
        Self {
            beads,
            sessions,
            worktrees,
            branches,
            names,
            town,
        }
    }

    pub fn town(&self) -> &TownContext {
        &self.town
    }

    /// Run the spawn sequence for one work unit.
    pub async fn spawn(
        &self,
        bead_id: &BeadId,
        rig_name: &str,
        options: &SpawnOptions,
    ) -> Result<SpawnOutcome, SpawnError> {
        let mut undo: Vec<Undo> = Vec::new();
        match self.spawn_inner(bead_id, rig_name, options, &mut undo).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::warn!(bead = %bead_id, rig = rig_name, error = %e, "spawn failed, rolling back");
                self.rollback(undo).await;
                Err(e)
            }
        }
    }

    async fn spawn_inner(
        &self,
        bead_id: &BeadId,
        rig_name: &str,
        options: &SpawnOptions,
        undo: &mut Vec<Undo>,
    ) -> Result<SpawnOutcome, SpawnError> {
        let rig = self
            .town
            .rig(rig_name)
            .ok_or_else(|| SpawnError::UnknownRig(rig_name.to_string()))?
            .clone();

        // 1. Validate the work unit exists.
        let bead = self
            .beads
            .show(bead_id)
            .await?
            .ok_or_else(|| SpawnError::NotFound(bead_id.clone()))?;
        let pre_status = bead.status;

        // Rollback closes the convoy only for its sole contributor.
        if let Some(convoy) = &options.convoy {
            if convoy.sole_contributor {
                undo.push(Undo::CloseConvoy {
                    convoy: convoy.id.clone(),
                });
            }
        }

        // 2. Cross-rig guard.
        if !options.force {
            if let Some(owner) = self.town.rig_for_bead(bead_id) {
                if owner.name != rig.name {
                    return Err(SpawnError::CrossRig {
                        bead: bead_id.clone(),
                        owner_rig: owner.name.clone(),
                        target_rig: rig.name.clone(),
                    });
                }
            }
        }

        // 3. Burn prior molecules when a formula will be applied.
        let fields = attachment::AttachmentFields::parse(&bead.description);
        if options.formula.is_some() || options.cooked.is_some() {
            if let Some(prior) = &fields.attached_molecule {
                if !options.force {
                    return Err(SpawnError::HasMolecules(bead_id.clone()));
                }
                tracing::info!(bead = %bead_id, molecule = %prior, "burning prior molecule under --force");
                if let Err(e) = self.beads.close(&BeadId::new(prior.clone()), Some("burned for re-sling")).await {
                    tracing::warn!(molecule = %prior, error = %e, "prior molecule close failed");
                }
                let cleared = attachment::clear(&bead.description, AttachmentField::AttachedMolecule);
                self.beads.update_description(bead_id, &cleared).await?;
            }
        }

        // 4. Allocate an identity from the rig's name pool.
        let polecat = self.names.claim();
        undo.push(Undo::ReleaseName {
            name: polecat.clone(),
        });
        let identity = AgentIdentity::polecat(&rig.name, &polecat);

        // 5. Create the work-tree off the base branch.
        let base = options.base_branch.as_deref().unwrap_or("main");
        let work_tree = self.town.polecats_dir(&rig.name).join(&polecat);
        let git_branch = format!("polecat/{}", polecat);
        self.worktrees
            .create(&rig.repo, &work_tree, &git_branch, base)
            .await
            .map_err(SpawnError::Worktree)?;
        undo.push(Undo::RemoveWorktree {
            repo: rig.repo.clone(),
            path: work_tree.clone(),
        });

        // 6. Agent record, initial state spawning.
        let agent_record = self.beads.create_agent(&identity).await?;
        undo.push(Undo::CloseAgentRecord {
            agent: agent_record.clone(),
        });

        // 7. Optionally cook and instantiate the formula on the bead.
        let molecule = self
            .attach_molecule(bead_id, options, undo)
            .await?;

        // 8. Hook the work unit (or the molecule root) to the agent.
        let hook_target = molecule.clone().unwrap_or_else(|| bead_id.clone());
        self.hook_with_retry(&hook_target, &identity).await?;
        undo.push(Undo::ResetStatus {
            bead: bead_id.clone(),
            status: pre_status,
        });

        // 9. Agent state spawning → idle → working. Idle retries to
        // tolerate serialization conflicts with the agent's own writes.
        self.with_retry("agent_idle", || {
            self.beads.set_agent_state(&agent_record, AgentBeadState::Idle)
        })
        .await
        .map_err(SpawnError::Beads)?;
        self.beads
            .set_agent_state(&agent_record, AgentBeadState::Working)
            .await?;

        // 10. Attachment fields, one read-modify-write over the whole
        // description.
        self.write_attachment_fields(bead_id, options, &identity, molecule.as_ref())
            .await?;
        undo.push(Undo::ClearMoleculeStamp {
            bead: bead_id.clone(),
        });

        // 11. Isolated store branch. Ordered after every sling-related
        // write above so the branch includes them.
        let store_branch = format!("polecat-{}", polecat);
        self.branches
            .create_branch(&rig.database, &store_branch)
            .await
            .map_err(SpawnError::Branch)?;
        undo.push(Undo::DeleteBranch {
            db: rig.database.clone(),
            name: store_branch,
        });

        // 12. Start the supervised session. The session UUID doubles as
        // the agent's conversation-log ID for the log tail.
        let log_session_id = uuid::Uuid::new_v4().to_string();
        let agent_cmd = options.agent_type.as_deref().unwrap_or("claude");
        let command = format!("{} --session-id {}", agent_cmd, log_session_id);
        let session_name = format!("{}-{}", rig.name, polecat);
        let env_vars = vec![
            ("GT_RIG".to_string(), rig.name.clone()),
            ("GT_BEAD".to_string(), bead_id.to_string()),
            ("GT_POLECAT".to_string(), polecat.clone()),
            ("GT_SESSION_ID".to_string(), log_session_id),
        ];
        let session = self
            .sessions
            .spawn(&session_name, &work_tree, &command, &env_vars)
            .await
            .map_err(|e| SpawnError::Session(e.to_string()))?;

        if let Ok(first_output) = self.sessions.capture_output(&session, 5).await {
            if !first_output.trim().is_empty() {
                tracing::debug!(session = %session, output = %first_output.trim(), "session first output");
            }
        }

        tracing::info!(
            bead = %bead_id,
            rig = %rig.name,
            polecat = %polecat,
            session = %session,
            molecule = ?molecule,
            "polecat spawned"
        );

        Ok(SpawnOutcome {
            bead: bead_id.clone(),
            polecat,
            session,
            work_tree,
            molecule,
            agent_record,
        })
    }

    async fn attach_molecule(
        &self,
        bead_id: &BeadId,
        options: &SpawnOptions,
        undo: &mut Vec<Undo>,
    ) -> Result<Option<BeadId>, SpawnError> {
        let cooked = match (&options.cooked, &options.formula) {
            (Some(cooked), _) => Some(cooked.clone()),
            (None, Some(formula)) => match self.beads.cook_formula(formula).await {
                Ok(cooked) => Some(cooked),
                Err(e) if options.batch_mode => {
                    tracing::warn!(formula, error = %e, "cook failed in batch mode, slinging raw bead");
                    None
                }
                Err(e) => {
                    return Err(SpawnError::Cook {
                        formula: formula.clone(),
                        message: e.to_string(),
                    });
                }
            },
            (None, None) => None,
        };
        let Some(cooked) = cooked else {
            return Ok(None);
        };

        match self.beads.attach_formula(&cooked, bead_id).await {
            Ok(root) => {
                undo.push(Undo::CloseMolecule { root: root.clone() });
                Ok(Some(root))
            }
            Err(e) if options.batch_mode => {
                tracing::warn!(bead = %bead_id, error = %e, "formula attach failed in batch mode, slinging raw bead");
                Ok(None)
            }
            Err(e) => Err(SpawnError::Cook {
                formula: options.formula.clone().unwrap_or_else(|| cooked.clone()),
                message: e.to_string(),
            }),
        }
    }

    async fn hook_with_retry(
        &self,
        target: &BeadId,
        identity: &AgentIdentity,
    ) -> Result<(), SpawnError> {
        self.with_retry("hook", || self.beads.hook(target, identity))
            .await
            .map_err(SpawnError::Hook)
    }

    /// Bounded retry on transient issue-layer errors.
    async fn with_retry<F, Fut>(&self, operation: &str, mut call: F) -> Result<(), BeadsError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<(), BeadsError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt + 1 < RETRY_ATTEMPTS => {
                    attempt += 1;
                    let backoff = env::hook_retry_base() * attempt;
                    tracing::debug!(operation, attempt, error = %e, "transient failure, backing off");
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn write_attachment_fields(
        &self,
        bead_id: &BeadId,
        options: &SpawnOptions,
        identity: &AgentIdentity,
        molecule: Option<&BeadId>,
    ) -> Result<(), SpawnError> {
        // Re-read so concurrent edits to other description text survive
        // this read-modify-write.
        let current = self
            .beads
            .show(bead_id)
            .await?
            .ok_or_else(|| SpawnError::NotFound(bead_id.clone()))?;
        let mut description = current.description;

        let dispatcher = options
            .dispatcher
            .clone()
            .unwrap_or_else(|| identity.handle());
        description = attachment::upsert(&description, AttachmentField::Dispatcher, &dispatcher);
        if !options.args.is_empty() {
            description =
                attachment::upsert(&description, AttachmentField::Args, &options.args.join(" "));
        }
        if let Some(root) = molecule {
            description =
                attachment::upsert(&description, AttachmentField::AttachedMolecule, root.as_str());
        }
        if options.no_merge {
            description = attachment::upsert(&description, AttachmentField::NoMerge, "true");
        }
        if let Some(strategy) = &options.merge_strategy {
            description = attachment::upsert(&description, AttachmentField::MergeStrategy, strategy);
        }
        // Stamp the convoy only when it actually tracks this unit.
        if let Some(convoy) = &options.convoy {
            if convoy.tracked.contains(bead_id) {
                description =
                    attachment::upsert(&description, AttachmentField::Convoy, convoy.id.as_str());
            }
        }

        self.beads
            .update_description(bead_id, &description)
            .await?;
        Ok(())
    }

    /// Run compensations newest-first. Each is best-effort: failures are
    /// logged and the stack keeps unwinding.
    async fn rollback(&self, undo: Vec<Undo>) {
        for entry in undo.into_iter().rev() {
            match entry {
                Undo::ResetStatus { bead, status } => {
                    if let Err(e) = self.beads.set_status(&bead, status).await {
                        tracing::warn!(bead = %bead, error = %e, "rollback: status reset failed");
                    }
                }
                Undo::ClearMoleculeStamp { bead } => {
                    match self.beads.show(&bead).await {
                        Ok(Some(current)) => {
                            let cleared = attachment::clear(
                                &current.description,
                                AttachmentField::AttachedMolecule,
                            );
                            if let Err(e) =
                                self.beads.update_description(&bead, &cleared).await
                            {
                                tracing::warn!(bead = %bead, error = %e, "rollback: stamp clear failed");
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            tracing::warn!(bead = %bead, error = %e, "rollback: could not re-read bead");
                        }
                    }
                }
                Undo::CloseMolecule { root } => {
                    if let Err(e) = self.beads.close(&root, Some("spawn rolled back")).await {
                        tracing::warn!(molecule = %root, error = %e, "rollback: molecule close failed");
                    }
                }
                Undo::CloseAgentRecord { agent } => {
                    if let Err(e) = self.beads.close(&agent, Some("spawn rolled back")).await {
                        tracing::warn!(agent = %agent, error = %e, "rollback: agent close failed");
                    }
                }
                Undo::ReleaseName { name } => {
                    self.names.release(&name);
                }
                Undo::RemoveWorktree { repo, path } => {
                    if let Err(e) = self.worktrees.remove(&repo, &path).await {
                        tracing::warn!(path = %path.display(), error = %e, "rollback: work-tree removal failed");
                    }
                }
                Undo::DeleteBranch { db, name } => {
                    if let Err(e) = self.branches.delete_branch(&db, &name).await {
                        tracing::warn!(db = %db, branch = %name, error = %e, "rollback: branch delete failed");
                    }
                }
                Undo::CloseConvoy { convoy } => {
                    if let Err(e) = self
                        .beads
                        .close(&convoy, Some("spawn failed, convoy abandoned"))
                        .await
                    {
                        tracing::warn!(convoy = %convoy, error = %e, "rollback: convoy close failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;
