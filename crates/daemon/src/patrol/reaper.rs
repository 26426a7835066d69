// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The wisp reaper: deletes closed ephemeral records past their age.

use super::{Patrol, PatrolError};
use async_trait::async_trait;
use gt_adapters::BeadsAdapter;
use gt_engine::MoleculeTracker;
use gt_store::StoreOps;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default age past which closed wisps are reaped (168h).
pub const DEFAULT_DELETE_AGE: Duration = Duration::from_secs(168 * 3600);

pub struct ReaperPatrol<S: StoreOps, B: BeadsAdapter> {
    store: S,
    beads: B,
    tracker: MoleculeTracker<B>,
    /// Databases to sweep; `None` enumerates at run time.
    databases: Option<Vec<String>>,
    delete_age: Duration,
}

impl<S: StoreOps, B: BeadsAdapter> ReaperPatrol<S, B> {
    pub fn new(
        store: S,
        beads: B,
        tracker: MoleculeTracker<B>,
        databases: Option<Vec<String>>,
        delete_age: Duration,
    ) -> Self {
        Self {
            store,
            beads,
            tracker,
            databases,
            delete_age,
        }
    }

    /// The sweep itself, separated from lifecycle logging for tests.
    /// Per-database failures are logged and skipped, never fatal.
    pub async fn sweep(&self, cancel: &CancellationToken) -> Result<u64, PatrolError> {
        let databases = match &self.databases {
            Some(list) => list.clone(),
            None => self.store.databases().await?,
        };

        let mut total = 0u64;
        for db in &databases {
            if cancel.is_cancelled() {
                tracing::info!(patrol = gt_core::PATROL_REAPER, "cancelled mid-sweep");
                break;
            }
            match self
                .beads
                .purge_closed_wisps(db, self.delete_age, false)
                .await
            {
                Ok(count) => {
                    if count > 0 {
                        tracing::info!(patrol = gt_core::PATROL_REAPER, db = %db, purged = count, "reaped closed wisps");
                    }
                    total += count;
                }
                Err(e) => {
                    tracing::warn!(patrol = gt_core::PATROL_REAPER, db = %db, error = %e, "purge failed, continuing sweep");
                }
            }
        }
        Ok(total)
    }
}

#[async_trait]
impl<S: StoreOps + 'static, B: BeadsAdapter> Patrol for ReaperPatrol<S, B> {
    fn name(&self) -> &'static str {
        gt_core::PATROL_REAPER
    }

    async fn run(&self, cancel: &CancellationToken) -> Result<(), PatrolError> {
        let molecule = self.tracker.pour("wisp-reaper", &BTreeMap::new()).await;
        molecule.close_step("scan").await;

        match self.sweep(cancel).await {
            Ok(total) => {
                tracing::info!(patrol = gt_core::PATROL_REAPER, total_purged = total, "sweep complete");
                molecule.close_step("reap").await;
                molecule.close().await;
                Ok(())
            }
            Err(e) => {
                molecule.fail_step("reap", &e.to_string()).await;
                molecule.close().await;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
#[path = "reaper_tests.rs"]
mod tests;
