// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The compactor patrol: squash store history once it crosses the
//! commit threshold.

use super::{Patrol, PatrolError};
use async_trait::async_trait;
use gt_adapters::BeadsAdapter;
use gt_core::CompactionMode;
use gt_engine::MoleculeTracker;
use gt_store::StoreOps;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

/// Default keep-recent window for surgical mode.
pub const DEFAULT_KEEP_RECENT: u64 = 20;

pub struct CompactorPatrol<S: StoreOps, B: BeadsAdapter> {
    store: S,
    tracker: MoleculeTracker<B>,
    databases: Option<Vec<String>>,
    commit_threshold: u64,
    mode: CompactionMode,
    keep_recent: u64,
}

impl<S: StoreOps, B: BeadsAdapter> CompactorPatrol<S, B> {
    pub fn new(
        store: S,
        tracker: MoleculeTracker<B>,
        databases: Option<Vec<String>>,
        commit_threshold: u64,
        mode: CompactionMode,
        keep_recent: u64,
    ) -> Self {
        Self {
            store,
            tracker,
            databases,
            commit_threshold,
            mode,
            keep_recent,
        }
    }

    /// Compact every database at or above the threshold. Returns the
    /// number of databases compacted. Per-database failures are logged
    /// and skipped.
    pub async fn compact_due(&self, cancel: &CancellationToken) -> Result<u64, PatrolError> {
        let databases = match &self.databases {
            Some(list) => list.clone(),
            None => self.store.databases().await?,
        };

        let mut compacted = 0u64;
        for db in &databases {
            if cancel.is_cancelled() {
                tracing::info!(patrol = gt_core::PATROL_COMPACTOR, "cancelled mid-run");
                break;
            }

            let commits = match self.store.count_commits(db).await {
                Ok(commits) => commits,
                Err(e) => {
                    tracing::warn!(patrol = gt_core::PATROL_COMPACTOR, db = %db, error = %e, "commit count failed, skipping");
                    continue;
                }
            };
            if commits < self.commit_threshold {
                tracing::debug!(
                    patrol = gt_core::PATROL_COMPACTOR,
                    db = %db,
                    commits,
                    threshold = self.commit_threshold,
                    "below threshold"
                );
                continue;
            }

            let result = match self.mode {
                CompactionMode::Flatten => self.store.flatten(db).await,
                CompactionMode::Surgical => self.store.surgical(db, self.keep_recent).await,
            };
            match result {
                Ok(outcome) => {
                    compacted += 1;
                    tracing::info!(
                        patrol = gt_core::PATROL_COMPACTOR,
                        db = %db,
                        commits_before = outcome.commits_before,
                        commits_after = outcome.commits_after,
                        squashed = outcome.squashed,
                        skipped = outcome.skipped,
                        "compaction done"
                    );
                    // GC failures never reverse a landed compaction.
                    if let Err(e) = self.store.gc(db).await {
                        tracing::warn!(patrol = gt_core::PATROL_COMPACTOR, db = %db, error = %e, "post-compaction gc failed");
                    }
                }
                Err(e) => {
                    tracing::warn!(patrol = gt_core::PATROL_COMPACTOR, db = %db, error = %e, "compaction failed");
                }
            }
        }
        Ok(compacted)
    }
}

#[async_trait]
impl<S: StoreOps + 'static, B: BeadsAdapter> Patrol for CompactorPatrol<S, B> {
    fn name(&self) -> &'static str {
        gt_core::PATROL_COMPACTOR
    }

    async fn run(&self, cancel: &CancellationToken) -> Result<(), PatrolError> {
        let molecule = self.tracker.pour("compactor-dog", &BTreeMap::new()).await;
        molecule.close_step("scan").await;

        match self.compact_due(cancel).await {
            Ok(count) => {
                tracing::info!(patrol = gt_core::PATROL_COMPACTOR, compacted = count, "compactor pass complete");
                molecule.close_step("compact").await;
                molecule.close().await;
                Ok(())
            }
            Err(e) => {
                molecule.fail_step("compact", &e.to_string()).await;
                molecule.close().await;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
#[path = "compactor_tests.rs"]
mod tests;
