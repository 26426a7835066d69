// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batch dispatcher: validate a batch, create its convoy, then drive the
//! spawn pipeline unit by unit.
//!
//! Spawns are strictly sequential with a pacing delay between them, plus
//! a longer admission pause after every `max_concurrent` successes.

use crate::env;
use crate::spawn::{ConvoyRef, SpawnOptions, SpawnPipeline};
use crate::town::TownContext;
use gt_adapters::{BeadsAdapter, BeadsError, SessionAdapter};
use gt_core::BeadId;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Options for a whole batch.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub force: bool,
    pub base_branch: Option<String>,
    pub agent_type: Option<String>,
    pub formula: Option<String>,
    /// Admission control: pause after every N successes.
    pub max_concurrent: Option<u32>,
    pub dispatcher: Option<String>,
    pub merge_strategy: Option<String>,
    pub no_merge: bool,
    pub args: Vec<String>,
}

/// Errors that reject a batch before any spawn.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("empty batch")]
    Empty,
    #[error("bead(s) not found: {}", format_ids(.0))]
    NotFound(Vec<BeadId>),
    #[error("{}", render_cross_rig(.mismatches, .target_rig))]
    CrossRig {
        mismatches: Vec<(BeadId, String)>,
        target_rig: String,
    },
    #[error(transparent)]
    Beads(#[from] BeadsError),
}

fn format_ids(ids: &[BeadId]) -> String {
    ids.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_cross_rig(mismatches: &[(BeadId, String)], target_rig: &str) -> String {
    let named = mismatches
        .iter()
        .map(|(id, rig)| format!("{} (rig '{}')", id, rig))
        .collect::<Vec<_>>()
        .join(", ");
    format!("batch targets rig '{}' but {} belong(s) elsewhere", target_rig, named)
}

impl DispatchError {
    /// Numbered alternatives for the interactive `Options:` block.
    pub fn options(&self) -> Vec<String> {
        match self {
            DispatchError::CrossRig { mismatches, .. } => {
                let mut options = vec![format!(
                    "Remove the mismatched bead(s) from the batch: {}",
                    format_ids(&mismatches.iter().map(|(id, _)| id.clone()).collect::<Vec<_>>())
                )];
                for (id, rig) in mismatches {
                    options.push(format!("Sling it to its own rig: gt sling {} {}", id, rig));
                }
                options.push("Pass --force to override the rig guard".to_string());
                options
            }
            _ => Vec::new(),
        }
    }
}

/// Per-batch accounting.
#[derive(Debug, Clone, Default)]
pub struct DispatchSummary {
    pub convoy: Option<BeadId>,
    /// Units whose dependency edge landed on the convoy.
    pub tracked: BTreeSet<BeadId>,
    pub succeeded: Vec<BeadId>,
    pub failed: Vec<(BeadId, String)>,
}

impl DispatchSummary {
    pub fn all_failed(&self) -> bool {
        self.succeeded.is_empty() && !self.failed.is_empty()
    }
}

impl fmt::Display for DispatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} spawned, {} failed",
            self.succeeded.len(),
            self.failed.len()
        )?;
        for (id, reason) in &self.failed {
            write!(f, "\n  {}: {}", id, reason)?;
        }
        Ok(())
    }
}

/// Drives the spawn pipeline over an ordered batch of work units.
pub struct BatchDispatcher<B, S, W, R>
where
    B: BeadsAdapter,
    S: SessionAdapter,
    W: crate::spawn::WorktreeOps,
    R: crate::spawn::BranchOps,
{
    pipeline: SpawnPipeline<B, S, W, R>,
    beads: B,
    town: Arc<TownContext>,
}

impl<B, S, W, R> BatchDispatcher<B, S, W, R>
where
    B: BeadsAdapter,
    S: SessionAdapter,
    W: crate::spawn::WorktreeOps,
    R: crate::spawn::BranchOps,
{
    pub fn new(pipeline: SpawnPipeline<B, S, W, R>, beads: B, town: Arc<TownContext>) -> Self {
        Self {
            pipeline,
            beads,
            town,
        }
    }

    /// Dispatch a batch to `rig_name`. Order-significant: spawn `i`
    /// starts before spawn `i + 1`.
    pub async fn dispatch(
        &self,
        ids: &[BeadId],
        rig_name: &str,
        options: &BatchOptions,
    ) -> Result<DispatchSummary, DispatchError> {
        if ids.is_empty() {
            return Err(DispatchError::Empty);
        }

        // Validate every ID before any spawn.
        let mut missing = Vec::new();
        for id in ids {
            if self.beads.show(id).await?.is_none() {
                missing.push(id.clone());
            }
        }
        if !missing.is_empty() {
            return Err(DispatchError::NotFound(missing));
        }

        // Whole-batch cross-rig pre-check.
        if !options.force {
            let mismatches: Vec<(BeadId, String)> = ids
                .iter()
                .filter_map(|id| {
                    let owner = self.town.rig_for_bead(id)?;
                    (owner.name != rig_name).then(|| (id.clone(), owner.name.clone()))
                })
                .collect();
            if !mismatches.is_empty() {
                return Err(DispatchError::CrossRig {
                    mismatches,
                    target_rig: rig_name.to_string(),
                });
            }
        }

        // One convoy tracks the whole batch. Edges that fail to land are
        // recorded: those units spawn unstamped.
        let convoy_id = self
            .beads
            .create(
                &format!("Convoy: {} bead(s) to {}", ids.len(), rig_name),
                &format!("Tracking batch dispatch to rig {}", rig_name),
                2,
            )
            .await?;
        let mut tracked = BTreeSet::new();
        for id in ids {
            match self.beads.add_dependency(&convoy_id, id).await {
                Ok(()) => {
                    tracked.insert(id.clone());
                }
                Err(e) => {
                    tracing::warn!(convoy = %convoy_id, bead = %id, error = %e, "dependency edge failed, bead will not be stamped");
                }
            }
        }

        // Pre-cook the formula once; every unit reuses the artifact.
        let cooked = match &options.formula {
            Some(formula) => match self.beads.cook_formula(formula).await {
                Ok(cooked) => Some(cooked),
                Err(e) => {
                    tracing::warn!(formula, error = %e, "pre-cook failed, batch slings raw beads");
                    None
                }
            },
            None => None,
        };

        let convoy = ConvoyRef {
            id: convoy_id.clone(),
            tracked: tracked.clone(),
            sole_contributor: ids.len() == 1,
        };

        let mut summary = DispatchSummary {
            convoy: Some(convoy_id.clone()),
            tracked,
            ..Default::default()
        };

        let spawn_options = SpawnOptions {
            force: options.force,
            base_branch: options.base_branch.clone(),
            agent_type: options.agent_type.clone(),
            formula: options.formula.clone(),
            cooked,
            batch_mode: true,
            dispatcher: options.dispatcher.clone(),
            args: options.args.clone(),
            merge_strategy: options.merge_strategy.clone(),
            no_merge: options.no_merge,
            convoy: Some(convoy),
        };

        for (index, id) in ids.iter().enumerate() {
            if index > 0 {
                // Pacing: spread issue-layer writes between spawns.
                tokio::time::sleep(env::sling_spawn_delay()).await;
            }

            match self.pipeline.spawn(id, rig_name, &spawn_options).await {
                Ok(outcome) => {
                    tracing::info!(bead = %id, polecat = %outcome.polecat, "batch spawn succeeded");
                    summary.succeeded.push(id.clone());
                }
                Err(e) => {
                    tracing::warn!(bead = %id, error = %e, "batch spawn failed");
                    summary.failed.push((id.clone(), e.to_string()));
                }
            }

            if let Some(max) = options.max_concurrent {
                if max > 0
                    && !summary.succeeded.is_empty()
                    && summary.succeeded.len() % max as usize == 0
                    && index + 1 < ids.len()
                {
                    tracing::debug!(
                        successes = summary.succeeded.len(),
                        "admission control: letting polecats settle"
                    );
                    tokio::time::sleep(env::sling_relax_delay()).await;
                }
            }
        }

        if summary.all_failed() {
            let reason = format!("all {} spawns failed", ids.len());
            if let Err(e) = self.beads.close(&convoy_id, Some(&reason)).await {
                tracing::warn!(convoy = %convoy_id, error = %e, "could not close failed convoy");
            }
            summary.convoy = None;
        }

        tracing::info!(
            rig = rig_name,
            total = ids.len(),
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            "batch dispatch complete"
        );

        Ok(summary)
    }

}

/// Render an error plus its numbered `Options:` block, as shown
/// interactively.
pub fn render_options(message: &str, options: &[String]) -> String {
    let mut out = message.to_string();
    if !options.is_empty() {
        out.push_str("\nOptions:");
        for (i, option) in options.iter().enumerate() {
            out.push_str(&format!("\n  {}. {}", i + 1, option));
        }
    }
    out
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
