// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Molecule lifecycle tracking for patrols and dispatch.
//!
//! A tracker pours a molecule per invocation and maps its step wisps to
//! slugs by title. Everything here degrades gracefully: if the root
//! cannot be created the handle becomes a no-op sentinel, and no
//! operation ever fails its caller.

use gt_adapters::{BeadsAdapter, BeadsError};
use gt_core::BeadId;
use std::collections::BTreeMap;

/// Step slug vocabulary. Slugs resolve by case-insensitive substring
/// match on the step wisp's title; the table is data, so extending the
/// vocabulary never touches the matching logic.
pub const STEP_SLUGS: &[&str] = &[
    "scan",
    "reap",
    "purge",
    "report",
    "export",
    "push",
    "diagnose",
    "backup",
    "probe",
    "inspect",
    "clean",
    "verify",
    "compact",
    "auto-close",
    "sync",
    "offsite",
];

/// Resolve a step title to its slug (first vocabulary hit).
pub fn slug_for_title(title: &str) -> Option<&'static str> {
    let lower = title.to_lowercase();
    STEP_SLUGS.iter().copied().find(|slug| lower.contains(slug))
}

/// Pours molecules and hands out tracking handles.
#[derive(Clone)]
pub struct MoleculeTracker<B: BeadsAdapter> {
    beads: B,
}

impl<B: BeadsAdapter> MoleculeTracker<B> {
    pub fn new(beads: B) -> Self {
        Self { beads }
    }

    /// Instantiate `formula` and return a handle over its steps.
    ///
    /// Never fails: when the issue layer is down or the formula is
    /// missing, the returned handle has no root and every operation on
    /// it is a successful no-op.
    pub async fn pour(
        &self,
        formula: &str,
        vars: &BTreeMap<String, String>,
    ) -> MoleculeHandle<B> {
        let root = match self.pour_root(formula, vars).await {
            Ok(root) => Some(root),
            Err(e) => {
                tracing::warn!(formula, error = %e, "molecule pour failed, tracking disabled for this run");
                None
            }
        };

        let mut steps = BTreeMap::new();
        if let Some(root) = &root {
            match self.beads.children(root).await {
                Ok(children) => {
                    for child in children {
                        if let Some(slug) = slug_for_title(&child.title) {
                            // Last write wins; patrol bodies call each
                            // slug once, so collisions are harmless.
                            steps.insert(slug, child.id);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(formula, root = %root, error = %e, "could not enumerate molecule steps");
                }
            }
        }

        MoleculeHandle {
            beads: self.beads.clone(),
            root,
            steps,
        }
    }

    async fn pour_root(
        &self,
        formula: &str,
        vars: &BTreeMap<String, String>,
    ) -> Result<BeadId, BeadsError> {
        let cooked = self.beads.cook_formula(formula).await?;
        self.beads.pour(&cooked, vars).await
    }
}

/// Handle over one poured molecule. All operations are best-effort and
/// infallible from the caller's point of view.
pub struct MoleculeHandle<B: BeadsAdapter> {
    beads: B,
    root: Option<BeadId>,
    steps: BTreeMap<&'static str, BeadId>,
}

impl<B: BeadsAdapter> MoleculeHandle<B> {
    pub fn root_id(&self) -> Option<&BeadId> {
        self.root.as_ref()
    }

    /// True when pour degraded and this handle tracks nothing.
    pub fn is_noop(&self) -> bool {
        self.root.is_none()
    }

    /// Mark a step done.
    pub async fn close_step(&self, slug: &str) {
        let Some(step) = self.steps.get(slug) else {
            if self.root.is_some() {
                tracing::debug!(slug, "no step wisp for slug");
            }
            return;
        };
        if let Err(e) = self.beads.close(step, None).await {
            tracing::warn!(slug, step = %step, error = %e, "close_step failed");
        }
    }

    /// Mark a step failed, with the reason on the closing record.
    pub async fn fail_step(&self, slug: &str, reason: &str) {
        let Some(step) = self.steps.get(slug) else {
            return;
        };
        if let Err(e) = self.beads.close(step, Some(reason)).await {
            tracing::warn!(slug, step = %step, error = %e, "fail_step failed");
        }
    }

    /// Close the molecule. Any direct child still open, hooked, or
    /// in-progress is force-closed first: the backstop that keeps step
    /// wisps from leaking when a patrol body skips a `close_step`.
    pub async fn close(self) {
        let Some(root) = &self.root else {
            return;
        };
        match self.beads.children(root).await {
            Ok(children) => {
                for child in children {
                    if child.status.is_open_like() {
                        if let Err(e) = self.beads.close(&child.id, Some("orphaned at molecule close")).await {
                            tracing::warn!(child = %child.id, error = %e, "orphan close failed");
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(root = %root, error = %e, "could not enumerate children at close");
            }
        }
        if let Err(e) = self.beads.close(root, None).await {
            tracing::warn!(root = %root, error = %e, "molecule close failed");
        }
    }
}

#[cfg(test)]
#[path = "molecule_tests.rs"]
mod tests;
