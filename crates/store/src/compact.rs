// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! History compaction: flatten and surgical rebase.
//!
//! Flatten squashes the whole history into one commit and is safe on a
//! live server (each concurrent write is an isolated transaction the
//! store rebases). Surgical rebase keeps the most recent N commits as
//! individual picks and squashes everything between the root pick and
//! the kept tail; it is NOT safe against concurrent writes, so it
//! detects HEAD movement and retries once on a classified
//! concurrent-write failure.

use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Scratch branch holding the root commit during a surgical rebase.
pub const BRANCH_COMPACT_BASE: &str = "compact-base";
/// Scratch branch the rebase rewrites; becomes `main` on success.
pub const BRANCH_COMPACT_WORK: &str = "compact-work";

const MAIN_BRANCH: &str = "main";

/// Pause before the single concurrent-write retry.
const RETRY_PAUSE: Duration = Duration::from_secs(2);

/// Store surface a compaction run needs. Implemented by
/// [`crate::client::StoreSession`] over one dedicated connection, and by
/// a fake for tests.
#[async_trait]
pub trait CompactionStore: Send {
    async fn row_counts(&mut self) -> Result<BTreeMap<String, u64>, StoreError>;
    async fn count_commits(&mut self) -> Result<u64, StoreError>;
    async fn root_commit(&mut self) -> Result<String, StoreError>;
    async fn head(&mut self, branch: &str) -> Result<String, StoreError>;
    async fn reset_soft(&mut self, hash: &str) -> Result<(), StoreError>;
    async fn commit_all(&mut self, message: &str) -> Result<(), StoreError>;
    async fn create_branch(&mut self, name: &str, from: &str) -> Result<(), StoreError>;
    async fn delete_branch(&mut self, name: &str) -> Result<(), StoreError>;
    async fn rename_branch(&mut self, from: &str, to: &str) -> Result<(), StoreError>;
    async fn checkout(&mut self, name: &str) -> Result<(), StoreError>;
    async fn branches(&mut self) -> Result<Vec<String>, StoreError>;
    async fn rebase_interactive(&mut self, base: &str) -> Result<(), StoreError>;
    /// `(MIN(rebase_order), MAX(rebase_order))` of the plan table, or
    /// `None` when the plan is empty.
    async fn rebase_plan_bounds(&mut self) -> Result<Option<(u64, u64)>, StoreError>;
    /// Mark plan rows with `above < rebase_order <= upto` as `squash`.
    /// Returns the number of rows updated.
    async fn squash_plan_range(&mut self, above: u64, upto: u64) -> Result<u64, StoreError>;
    async fn rebase_continue(&mut self) -> Result<(), StoreError>;
    async fn rebase_abort(&mut self) -> Result<(), StoreError>;
}

/// Errors a compaction run can surface.
#[derive(Debug, Error)]
pub enum CompactionError {
    /// Post-flight state does not match pre-flight; the run aborted.
    #[error("integrity violation in {db}: {detail}")]
    Integrity { db: String, detail: String },
    /// A concurrent writer moved HEAD (or broke the rebase graph) and the
    /// retry budget is spent.
    #[error("concurrency abort in {db}: {detail}")]
    ConcurrencyAbort { db: String, detail: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CompactionError {
    fn is_concurrent(&self) -> bool {
        match self {
            CompactionError::ConcurrencyAbort { .. } => true,
            CompactionError::Store(e) => e.is_concurrent_write(),
            CompactionError::Integrity { .. } => false,
        }
    }
}

/// Result of one compaction run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionOutcome {
    pub db: String,
    pub commits_before: u64,
    pub commits_after: u64,
    /// Plan rows rewritten to `squash` (0 for flatten and for skipped runs).
    pub squashed: u64,
    /// True when there was nothing to squash and the run exited early.
    pub skipped: bool,
}

/// Compare pre/post row counts. Every pre-flight table must still exist
/// with the same count; extra post-flight tables are tolerated (a
/// concurrent writer may legitimately create one during a flatten).
fn verify_row_counts(
    pre: &BTreeMap<String, u64>,
    post: &BTreeMap<String, u64>,
) -> Result<(), String> {
    for (table, before) in pre {
        match post.get(table) {
            None => return Err(format!("table {} missing after compaction", table)),
            Some(after) if after != before => {
                return Err(format!(
                    "table {} row count changed: {} before, {} after",
                    table, before, after
                ));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Squash the entire history of `db` into a single commit.
///
/// Live-safe: no scratch branches, and each step is one store
/// transaction. Any integrity mismatch aborts with an error; there is
/// no retry path here.
pub async fn flatten<S: CompactionStore>(
    store: &mut S,
    db: &str,
) -> Result<CompactionOutcome, CompactionError> {
    let pre_counts = store.row_counts().await?;
    let commits_before = store.count_commits().await?;
    let root = store.root_commit().await?;

    tracing::info!(db, commits_before, root = %root, "flatten: squashing history to root");

    store.reset_soft(&root).await?;
    store
        .commit_all(&format!("flatten {} history", db))
        .await?;

    let post_counts = store.row_counts().await?;
    if let Err(detail) = verify_row_counts(&pre_counts, &post_counts) {
        return Err(CompactionError::Integrity {
            db: db.to_string(),
            detail,
        });
    }

    let commits_after = store.count_commits().await?;
    tracing::info!(
        db,
        commits_before,
        commits_after,
        tables = pre_counts.len(),
        "flatten: integrity verified"
    );

    Ok(CompactionOutcome {
        db: db.to_string(),
        commits_before,
        commits_after,
        squashed: 0,
        skipped: false,
    })
}

/// Surgical rebase: squash old history, keep the `keep_recent` newest
/// commits as individual picks.
///
/// Retries once, after a short pause, when the failure classifies as a
/// concurrent write; any further failure surfaces.
pub async fn surgical<S: CompactionStore>(
    store: &mut S,
    db: &str,
    keep_recent: u64,
) -> Result<CompactionOutcome, CompactionError> {
    match surgical_once(store, db, keep_recent).await {
        Err(e) if e.is_concurrent() => {
            tracing::warn!(db, error = %e, "surgical rebase hit concurrent write, retrying once");
            tokio::time::sleep(RETRY_PAUSE).await;
            surgical_once(store, db, keep_recent).await
        }
        result => result,
    }
}

async fn surgical_once<S: CompactionStore>(
    store: &mut S,
    db: &str,
    keep_recent: u64,
) -> Result<CompactionOutcome, CompactionError> {
    let pre_head = store.head(MAIN_BRANCH).await?;
    let pre_counts = store.row_counts().await?;
    let commits_before = store.count_commits().await?;
    let root = store.root_commit().await?;

    // A prior failed run may have left scratch branches behind.
    let existing = store.branches().await?;
    for stray in [BRANCH_COMPACT_BASE, BRANCH_COMPACT_WORK] {
        if existing.iter().any(|b| b == stray) {
            tracing::warn!(db, branch = stray, "deleting stray branch from prior run");
            store.delete_branch(stray).await?;
        }
    }

    if let Err(e) = setup_and_rebase(store, db, &root).await {
        cleanup_failed(store, true).await;
        return Err(e);
    }

    let bounds = match store.rebase_plan_bounds().await {
        Ok(b) => b,
        Err(e) => {
            cleanup_failed(store, true).await;
            return Err(e.into());
        }
    };
    let Some((min_order, max_order)) = bounds else {
        tracing::info!(db, "surgical: empty rebase plan, nothing to do");
        let _ = store.rebase_abort().await;
        cleanup_failed(store, false).await;
        return Ok(CompactionOutcome {
            db: db.to_string(),
            commits_before,
            commits_after: commits_before,
            squashed: 0,
            skipped: true,
        });
    };

    let squash_threshold = max_order.saturating_sub(keep_recent);
    if squash_threshold <= min_order {
        tracing::info!(
            db,
            commits_before,
            keep_recent,
            "surgical: history shorter than keep window, nothing to squash"
        );
        let _ = store.rebase_abort().await;
        cleanup_failed(store, false).await;
        return Ok(CompactionOutcome {
            db: db.to_string(),
            commits_before,
            commits_after: commits_before,
            squashed: 0,
            skipped: true,
        });
    }

    // The first plan row must stay a pick: a squash folds into its
    // parent, and the root pick is the only parent available.
    let squashed = match store.squash_plan_range(min_order, squash_threshold).await {
        Ok(n) => n,
        Err(e) => {
            cleanup_failed(store, true).await;
            return Err(e.into());
        }
    };

    if let Err(e) = store.rebase_continue().await {
        cleanup_failed(store, true).await;
        return Err(e.into());
    }

    // Integrity: log-only on read failure (the rebase has already
    // committed), abort on a real mismatch.
    match store.row_counts().await {
        Ok(post_counts) => {
            if let Err(detail) = verify_row_counts(&pre_counts, &post_counts) {
                cleanup_failed(store, false).await;
                return Err(CompactionError::Integrity {
                    db: db.to_string(),
                    detail,
                });
            }
        }
        Err(e) => {
            tracing::warn!(db, error = %e, "surgical: could not re-count rows, proceeding");
        }
    }

    // Concurrency: anyone committed to main while we rebased?
    match store.head(MAIN_BRANCH).await {
        Ok(now_head) if now_head != pre_head => {
            cleanup_failed(store, false).await;
            return Err(CompactionError::ConcurrencyAbort {
                db: db.to_string(),
                detail: format!("main moved from {} to {} during rebase", pre_head, now_head),
            });
        }
        Ok(_) => {}
        Err(e) => {
            cleanup_failed(store, false).await;
            return Err(e.into());
        }
    }

    // Branch swap. If deleting main fails here, compact-work is left in
    // place on purpose: integrity and concurrency both passed, so it
    // holds the good history for manual recovery.
    if let Err(e) = store.delete_branch(MAIN_BRANCH).await {
        tracing::error!(
            db,
            error = %e,
            "surgical: could not delete main; rewritten history preserved on {}",
            BRANCH_COMPACT_WORK
        );
        return Err(e.into());
    }
    store.rename_branch(BRANCH_COMPACT_WORK, MAIN_BRANCH).await?;
    store.delete_branch(BRANCH_COMPACT_BASE).await?;
    store.checkout(MAIN_BRANCH).await?;

    let commits_after = store.count_commits().await?;
    tracing::info!(
        db,
        commits_before,
        commits_after,
        squashed,
        keep_recent,
        "surgical: rebase complete"
    );

    Ok(CompactionOutcome {
        db: db.to_string(),
        commits_before,
        commits_after,
        squashed,
        skipped: false,
    })
}

async fn setup_and_rebase<S: CompactionStore>(
    store: &mut S,
    db: &str,
    root: &str,
) -> Result<(), CompactionError> {
    store.create_branch(BRANCH_COMPACT_BASE, root).await?;
    store.create_branch(BRANCH_COMPACT_WORK, MAIN_BRANCH).await?;
    store.checkout(BRANCH_COMPACT_WORK).await?;
    tracing::debug!(db, root, "surgical: scratch branches created");
    store.rebase_interactive(BRANCH_COMPACT_BASE).await?;
    Ok(())
}

/// Best-effort cleanup after a failed (or skipped) run, before the swap.
/// Aborts any in-progress rebase, returns to main, and removes both
/// scratch branches. Failures are logged and ignored.
async fn cleanup_failed<S: CompactionStore>(store: &mut S, abort_rebase: bool) {
    if abort_rebase {
        if let Err(e) = store.rebase_abort().await {
            tracing::debug!(error = %e, "rebase abort during cleanup failed");
        }
    }
    if let Err(e) = store.checkout(MAIN_BRANCH).await {
        tracing::debug!(error = %e, "checkout main during cleanup failed");
    }
    for branch in [BRANCH_COMPACT_WORK, BRANCH_COMPACT_BASE] {
        if let Err(e) = store.delete_branch(branch).await {
            tracing::debug!(branch, error = %e, "branch delete during cleanup failed");
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

#[cfg(test)]
#[path = "compact_tests.rs"]
mod tests;
