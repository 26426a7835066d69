// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backup patrols: the JSONL git mirror and the store's own backup
//! remotes.

use super::{Patrol, PatrolError};
use async_trait::async_trait;
use gt_adapters::BeadsAdapter;
use gt_engine::MoleculeTracker;
use gt_store::StoreOps;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Deadline for one `DOLT_BACKUP('sync', ...)` call.
const BACKUP_SYNC_DEADLINE: Duration = Duration::from_secs(120);

/// Commits the JSONL export mirror so its git history dates each backup.
pub struct JsonlBackupPatrol<B: BeadsAdapter> {
    mirror: PathBuf,
    tracker: MoleculeTracker<B>,
}

impl<B: BeadsAdapter> JsonlBackupPatrol<B> {
    pub fn new(mirror: PathBuf, tracker: MoleculeTracker<B>) -> Self {
        Self { mirror, tracker }
    }
}

#[async_trait]
impl<B: BeadsAdapter> Patrol for JsonlBackupPatrol<B> {
    fn name(&self) -> &'static str {
        gt_core::PATROL_JSONL_BACKUP
    }

    async fn run(&self, _cancel: &CancellationToken) -> Result<(), PatrolError> {
        let molecule = self.tracker.pour("jsonl-git-backup", &BTreeMap::new()).await;

        if !self.mirror.exists() {
            tracing::debug!(patrol = self.name(), mirror = %self.mirror.display(), "no mirror directory, skipping");
            molecule.close().await;
            return Ok(());
        }

        match gt_adapters::git::commit_all(&self.mirror, "jsonl backup sync").await {
            Ok(true) => {
                tracing::info!(patrol = self.name(), "mirror committed");
                molecule.close_step("sync").await;
                molecule.close().await;
                Ok(())
            }
            Ok(false) => {
                tracing::debug!(patrol = self.name(), "mirror unchanged");
                molecule.close_step("sync").await;
                molecule.close().await;
                Ok(())
            }
            Err(e) => {
                molecule.fail_step("sync", &e).await;
                molecule.close().await;
                Err(PatrolError::Other(e))
            }
        }
    }
}

/// Syncs every database that has a configured backup remote.
pub struct DoltBackupPatrol<S: StoreOps, B: BeadsAdapter> {
    store: S,
    tracker: MoleculeTracker<B>,
    databases: Option<Vec<String>>,
}

impl<S: StoreOps, B: BeadsAdapter> DoltBackupPatrol<S, B> {
    pub fn new(store: S, tracker: MoleculeTracker<B>, databases: Option<Vec<String>>) -> Self {
        Self {
            store,
            tracker,
            databases,
        }
    }

    /// Sync all databases with targets; returns how many synced.
    pub async fn sync_all(&self, cancel: &CancellationToken) -> Result<u64, PatrolError> {
        let databases = match &self.databases {
            Some(list) => list.clone(),
            None => self.store.databases().await?,
        };

        let mut synced = 0u64;
        for db in &databases {
            if cancel.is_cancelled() {
                break;
            }
            let target = match self.store.backup_target(db).await {
                Ok(Some(target)) => target,
                Ok(None) => {
                    tracing::debug!(patrol = gt_core::PATROL_DOLT_BACKUP, db = %db, "no backup target");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(patrol = gt_core::PATROL_DOLT_BACKUP, db = %db, error = %e, "backup target lookup failed");
                    continue;
                }
            };
            match self
                .store
                .backup_sync(db, &target, BACKUP_SYNC_DEADLINE)
                .await
            {
                Ok(()) => {
                    synced += 1;
                    tracing::info!(patrol = gt_core::PATROL_DOLT_BACKUP, db = %db, target = %target, "backup synced");
                }
                Err(e) => {
                    tracing::warn!(patrol = gt_core::PATROL_DOLT_BACKUP, db = %db, target = %target, error = %e, "backup sync failed");
                }
            }
        }
        Ok(synced)
    }
}

#[async_trait]
impl<S: StoreOps + 'static, B: BeadsAdapter> Patrol for DoltBackupPatrol<S, B> {
    fn name(&self) -> &'static str {
        gt_core::PATROL_DOLT_BACKUP
    }

    async fn run(&self, cancel: &CancellationToken) -> Result<(), PatrolError> {
        let molecule = self.tracker.pour("dolt-backup", &BTreeMap::new()).await;
        match self.sync_all(cancel).await {
            Ok(synced) => {
                tracing::info!(patrol = self.name(), synced, "backup pass complete");
                molecule.close_step("backup").await;
                molecule.close().await;
                Ok(())
            }
            Err(e) => {
                molecule.fail_step("backup", &e.to_string()).await;
                molecule.close().await;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
#[path = "backup_tests.rs"]
mod tests;
