// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot maintenance pipeline: plan → backup → reap → compact → gc.
//!
//! Safe while the store is live. Per-database failures are recorded and
//! logged; the sweep never aborts early.

use crate::client::StoreClient;
use crate::compact::{self, CompactionError, CompactionOutcome};
use crate::error::StoreError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

/// Database-level operations the maintenance pipeline and the patrols
/// drive. Implemented by [`StoreClient`]; faked in tests.
#[async_trait]
pub trait StoreOps: Send + Sync {
    async fn databases(&self) -> Result<Vec<String>, StoreError>;
    async fn count_commits(&self, db: &str) -> Result<u64, StoreError>;
    /// First configured backup remote of `db`, if any.
    async fn backup_target(&self, db: &str) -> Result<Option<String>, StoreError>;
    async fn backup_sync(&self, db: &str, target: &str, deadline: Duration) -> Result<(), StoreError>;
    async fn flatten(&self, db: &str) -> Result<CompactionOutcome, CompactionError>;
    async fn surgical(&self, db: &str, keep_recent: u64) -> Result<CompactionOutcome, CompactionError>;
    async fn gc(&self, db: &str) -> Result<(), StoreError>;
    /// TCP-level `SELECT 1` round trip.
    async fn latency(&self) -> Result<Duration, StoreError>;
}

#[async_trait]
impl StoreOps for StoreClient {
    async fn databases(&self) -> Result<Vec<String>, StoreError> {
        StoreClient::databases(self, self.config().read_deadline()).await
    }

    async fn count_commits(&self, db: &str) -> Result<u64, StoreError> {
        StoreClient::count_commits(self, db, self.config().read_deadline()).await
    }

    async fn backup_target(&self, db: &str) -> Result<Option<String>, StoreError> {
        let targets = self
            .backup_targets(db, self.config().read_deadline())
            .await?;
        Ok(targets.into_iter().next())
    }

    async fn backup_sync(&self, db: &str, target: &str, deadline: Duration) -> Result<(), StoreError> {
        StoreClient::backup_sync(self, db, target, Instant::now() + deadline).await
    }

    async fn flatten(&self, db: &str) -> Result<CompactionOutcome, CompactionError> {
        let mut session = self
            .session(db, self.config().write_deadline())
            .await?;
        compact::flatten(&mut session, db).await
    }

    async fn surgical(&self, db: &str, keep_recent: u64) -> Result<CompactionOutcome, CompactionError> {
        let mut session = self
            .session(db, self.config().write_deadline())
            .await?;
        compact::surgical(&mut session, db, keep_recent).await
    }

    async fn gc(&self, db: &str) -> Result<(), StoreError> {
        StoreClient::gc(self, db).await
    }

    async fn latency(&self) -> Result<Duration, StoreError> {
        // Probe query, tighter than the general read class.
        StoreClient::latency(self, Instant::now() + Duration::from_secs(10)).await
    }
}

/// Purge of closed ephemerals, provided by the issue layer.
#[async_trait]
pub trait WispPurge: Send + Sync {
    /// Delete closed wisps older than `older_than` in `db`. Returns the
    /// purge count.
    async fn purge_closed(
        &self,
        db: &str,
        older_than: Duration,
        dry_run: bool,
    ) -> Result<u64, String>;
}

/// Tunables for a maintenance run.
#[derive(Debug, Clone)]
pub struct MaintainOptions {
    /// Flatten only databases at or above this commit count. The default
    /// here (100) is deliberately lower than the compactor patrol's 500:
    /// an operator running maintenance by hand wants a deeper clean.
    pub commit_threshold: u64,
    /// Closed wisps older than this are reaped.
    pub delete_age: Duration,
    pub backup_deadline: Duration,
}

impl Default for MaintainOptions {
    fn default() -> Self {
        Self {
            commit_threshold: 100,
            delete_age: Duration::from_secs(168 * 3600),
            backup_deadline: Duration::from_secs(120),
        }
    }
}

/// One database's row in the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbPlan {
    pub name: String,
    pub commits: u64,
    pub backup_target: Option<String>,
}

impl DbPlan {
    pub fn needs_flatten(&self, threshold: u64) -> bool {
        self.commits >= threshold
    }
}

/// The full maintenance plan, shown to the operator before execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintainPlan {
    pub databases: Vec<DbPlan>,
    pub commit_threshold: u64,
}

impl MaintainPlan {
    /// Human-readable rendering for the confirmation prompt.
    pub fn render(&self) -> String {
        let mut out = String::from("Maintenance plan:\n");
        for db in &self.databases {
            let flatten = if db.needs_flatten(self.commit_threshold) {
                format!("flatten ({} commits)", db.commits)
            } else {
                format!("skip flatten ({} commits)", db.commits)
            };
            let backup = match &db.backup_target {
                Some(target) => format!("backup -> {}", target),
                None => "no backup target".to_string(),
            };
            out.push_str(&format!("  {}: {}, {}, reap, gc\n", db.name, backup, flatten));
        }
        out
    }
}

/// Per-database accounting of one run.
#[derive(Debug, Clone, Default)]
pub struct DbOutcome {
    pub name: String,
    /// `None` when the database has no backup target.
    pub backed_up: Option<bool>,
    pub reaped: u64,
    pub flattened: bool,
    pub commits_removed: u64,
    pub gc_ok: bool,
    pub errors: Vec<String>,
}

/// Whole-run accounting.
#[derive(Debug, Clone, Default)]
pub struct MaintainReport {
    pub databases: Vec<DbOutcome>,
}

impl MaintainReport {
    pub fn total_reaped(&self) -> u64 {
        self.databases.iter().map(|d| d.reaped).sum()
    }

    pub fn total_flattened(&self) -> usize {
        self.databases.iter().filter(|d| d.flattened).count()
    }

    pub fn had_errors(&self) -> bool {
        self.databases.iter().any(|d| !d.errors.is_empty())
    }
}

/// Build the plan: enumerate databases, count commits, detect backup
/// targets.
pub async fn plan<S: StoreOps>(
    store: &S,
    options: &MaintainOptions,
) -> Result<MaintainPlan, StoreError> {
    let mut databases = Vec::new();
    for name in store.databases().await? {
        let commits = store.count_commits(&name).await?;
        let backup_target = store.backup_target(&name).await.unwrap_or_else(|e| {
            tracing::warn!(db = %name, error = %e, "could not read backup targets");
            None
        });
        databases.push(DbPlan {
            name,
            commits,
            backup_target,
        });
    }
    Ok(MaintainPlan {
        databases,
        commit_threshold: options.commit_threshold,
    })
}

/// Execute a plan. Steps per database: backup sync, reap closed wisps,
/// flatten at/above the commit threshold, gc.
pub async fn run<S: StoreOps, P: WispPurge>(
    store: &S,
    purger: &P,
    plan: &MaintainPlan,
    options: &MaintainOptions,
) -> MaintainReport {
    let mut report = MaintainReport::default();

    for db in &plan.databases {
        let mut outcome = DbOutcome {
            name: db.name.clone(),
            ..Default::default()
        };

        if let Some(target) = &db.backup_target {
            match store
                .backup_sync(&db.name, target, options.backup_deadline)
                .await
            {
                Ok(()) => outcome.backed_up = Some(true),
                Err(e) => {
                    tracing::warn!(db = %db.name, target = %target, error = %e, "backup sync failed");
                    outcome.backed_up = Some(false);
                    outcome.errors.push(format!("backup: {}", e));
                }
            }
        }

        match purger
            .purge_closed(&db.name, options.delete_age, false)
            .await
        {
            Ok(count) => {
                outcome.reaped = count;
                tracing::info!(db = %db.name, reaped = count, "reaped closed wisps");
            }
            Err(e) => {
                tracing::warn!(db = %db.name, error = %e, "wisp reap failed");
                outcome.errors.push(format!("reap: {}", e));
            }
        }

        if db.needs_flatten(plan.commit_threshold) {
            match store.flatten(&db.name).await {
                Ok(result) => {
                    outcome.flattened = true;
                    outcome.commits_removed =
                        result.commits_before.saturating_sub(result.commits_after);
                }
                Err(e) => {
                    tracing::warn!(db = %db.name, error = %e, "flatten failed");
                    outcome.errors.push(format!("flatten: {}", e));
                }
            }
        }

        match store.gc(&db.name).await {
            Ok(()) => outcome.gc_ok = true,
            Err(e) => {
                tracing::warn!(db = %db.name, error = %e, "gc failed");
                outcome.errors.push(format!("gc: {}", e));
            }
        }

        report.databases.push(outcome);
    }

    report
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

#[cfg(test)]
#[path = "maintain_tests.rs"]
mod tests;
