// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory store model for compaction tests.
#![cfg_attr(coverage_nightly, coverage(off))]

use super::CompactionStore;
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone)]
struct PlanRow {
    order: u64,
    action: String,
}

/// Behavioral model of a Dolt database: a linear commit history, user
/// tables with row counts, branches, and the interactive-rebase plan
/// table. Failures can be scripted per operation and call number.
pub struct FakeCompactionStore {
    tables: BTreeMap<String, u64>,
    commits: Vec<String>,
    main_head: String,
    branches: BTreeSet<String>,
    checked_out: String,
    plan: Option<Vec<PlanRow>>,
    /// Rewritten lineage on `compact-work`; lands on main at the rename.
    work_commits: Option<Vec<String>>,
    rebase_in_progress: bool,
    rebase_count: usize,
    failures: HashMap<&'static str, HashMap<usize, StoreError>>,
    counts: HashMap<&'static str, usize>,
    /// Move main's head on every `rebase_interactive` (simulates a
    /// concurrent writer landing commits throughout the run).
    pub move_head_every_rebase: bool,
    /// Shrink this table's row count right after `rebase_continue`
    /// (simulates data loss the integrity check must catch).
    pub corrupt_table_after_continue: Option<String>,
    /// Shrink this table's row count right after `commit_all`.
    pub corrupt_table_after_commit: Option<String>,
    /// Drop this table entirely right after `commit_all`.
    pub drop_table_after_commit: Option<String>,
    pub calls: Vec<String>,
}

impl FakeCompactionStore {
    /// A store with `n` commits and the given `(table, rows)` set.
    pub fn with_history(n: usize, tables: &[(&str, u64)]) -> Self {
        let commits: Vec<String> = (1..=n).map(|i| format!("c{}", i)).collect();
        let main_head = commits.last().cloned().unwrap_or_default();
        Self {
            tables: tables
                .iter()
                .map(|(name, rows)| (name.to_string(), *rows))
                .collect(),
            commits,
            main_head,
            branches: BTreeSet::new(),
            checked_out: "main".to_string(),
            plan: None,
            work_commits: None,
            rebase_in_progress: false,
            rebase_count: 0,
            failures: HashMap::new(),
            counts: HashMap::new(),
            move_head_every_rebase: false,
            corrupt_table_after_continue: None,
            corrupt_table_after_commit: None,
            drop_table_after_commit: None,
            calls: Vec::new(),
        }
    }

    /// Script the `n`-th call (1-based) to `operation` to fail.
    pub fn fail_on_call(&mut self, operation: &'static str, n: usize, error: StoreError) {
        self.failures.entry(operation).or_default().insert(n, error);
    }

    /// Script the next call to `operation` to fail.
    pub fn fail_next(&mut self, operation: &'static str, error: StoreError) {
        let next = self.counts.get(operation).copied().unwrap_or(0) + 1;
        self.fail_on_call(operation, next, error);
    }

    /// Pre-create a branch (e.g. a stray from a failed prior run).
    pub fn add_branch(&mut self, name: &str) {
        self.branches.insert(name.to_string());
    }

    pub fn commit_count(&self) -> usize {
        self.commits.len()
    }

    pub fn table_rows(&self, table: &str) -> Option<u64> {
        self.tables.get(table).copied()
    }

    pub fn has_branch(&self, name: &str) -> bool {
        self.branches.contains(name)
    }

    pub fn checked_out(&self) -> &str {
        &self.checked_out
    }

    /// Number of times `operation` was invoked.
    pub fn call_count(&self, operation: &str) -> usize {
        self.counts.get(operation).copied().unwrap_or(0)
    }

    fn record(&mut self, operation: &'static str) -> Result<(), StoreError> {
        self.calls.push(operation.to_string());
        let count = self.counts.entry(operation).or_insert(0);
        *count += 1;
        let n = *count;
        if let Some(scripted) = self.failures.get_mut(operation) {
            if let Some(err) = scripted.remove(&n) {
                return Err(err);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CompactionStore for FakeCompactionStore {
    async fn row_counts(&mut self) -> Result<BTreeMap<String, u64>, StoreError> {
        self.record("row_counts")?;
        Ok(self.tables.clone())
    }

    async fn count_commits(&mut self) -> Result<u64, StoreError> {
        self.record("count_commits")?;
        Ok(self.commits.len() as u64)
    }

    async fn root_commit(&mut self) -> Result<String, StoreError> {
        self.record("root_commit")?;
        self.commits
            .first()
            .cloned()
            .ok_or_else(|| StoreError::other("root_commit", "empty history"))
    }

    async fn head(&mut self, branch: &str) -> Result<String, StoreError> {
        self.record("head")?;
        if branch == "main" {
            Ok(self.main_head.clone())
        } else {
            Ok(format!("{}-head", branch))
        }
    }

    async fn reset_soft(&mut self, hash: &str) -> Result<(), StoreError> {
        self.record("reset_soft")?;
        self.commits.retain(|c| c == hash);
        Ok(())
    }

    async fn commit_all(&mut self, _message: &str) -> Result<(), StoreError> {
        self.record("commit_all")?;
        let next = format!("f{}", self.commits.len() + 1);
        self.commits.push(next.clone());
        self.main_head = next;
        if let Some(table) = self.corrupt_table_after_commit.take() {
            if let Some(rows) = self.tables.get_mut(&table) {
                *rows = rows.saturating_sub(1);
            }
        }
        if let Some(table) = self.drop_table_after_commit.take() {
            self.tables.remove(&table);
        }
        Ok(())
    }

    async fn create_branch(&mut self, name: &str, _from: &str) -> Result<(), StoreError> {
        self.record("create_branch")?;
        if !self.branches.insert(name.to_string()) {
            return Err(StoreError::other(
                "create_branch",
                format!("branch {} already exists", name),
            ));
        }
        Ok(())
    }

    async fn delete_branch(&mut self, name: &str) -> Result<(), StoreError> {
        self.record("delete_branch")?;
        if name == "main" {
            return Ok(());
        }
        if !self.branches.remove(name) {
            return Err(StoreError::other(
                "delete_branch",
                format!("no such branch {}", name),
            ));
        }
        if name == super::BRANCH_COMPACT_WORK {
            self.work_commits = None;
        }
        Ok(())
    }

    async fn rename_branch(&mut self, from: &str, to: &str) -> Result<(), StoreError> {
        self.record("rename_branch")?;
        if !self.branches.remove(from) {
            return Err(StoreError::other(
                "rename_branch",
                format!("no such branch {}", from),
            ));
        }
        if to == "main" {
            if let Some(rewritten) = self.work_commits.take() {
                self.main_head = rewritten.last().cloned().unwrap_or_default();
                self.commits = rewritten;
            }
        } else {
            self.branches.insert(to.to_string());
        }
        Ok(())
    }

    async fn checkout(&mut self, name: &str) -> Result<(), StoreError> {
        self.record("checkout")?;
        self.checked_out = name.to_string();
        Ok(())
    }

    async fn branches(&mut self) -> Result<Vec<String>, StoreError> {
        self.record("branches")?;
        let mut all = vec!["main".to_string()];
        all.extend(self.branches.iter().cloned());
        Ok(all)
    }

    async fn rebase_interactive(&mut self, _base: &str) -> Result<(), StoreError> {
        self.record("rebase_interactive")?;
        self.plan = Some(
            (1..=self.commits.len() as u64)
                .map(|order| PlanRow {
                    order,
                    action: "pick".to_string(),
                })
                .collect(),
        );
        self.rebase_in_progress = true;
        self.rebase_count += 1;
        if self.move_head_every_rebase {
            self.main_head = format!("intruder{}", self.rebase_count);
        }
        Ok(())
    }

    async fn rebase_plan_bounds(&mut self) -> Result<Option<(u64, u64)>, StoreError> {
        self.record("rebase_plan_bounds")?;
        Ok(self.plan.as_ref().and_then(|plan| {
            let min = plan.iter().map(|r| r.order).min()?;
            let max = plan.iter().map(|r| r.order).max()?;
            Some((min, max))
        }))
    }

    async fn squash_plan_range(&mut self, above: u64, upto: u64) -> Result<u64, StoreError> {
        self.record("squash_plan_range")?;
        let Some(plan) = self.plan.as_mut() else {
            return Err(StoreError::other("squash_plan_range", "no rebase in progress"));
        };
        let mut updated = 0;
        for row in plan.iter_mut() {
            if row.order > above && row.order <= upto {
                row.action = "squash".to_string();
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn rebase_continue(&mut self) -> Result<(), StoreError> {
        self.record("rebase_continue")?;
        let Some(plan) = self.plan.take() else {
            return Err(StoreError::other("rebase_continue", "no rebase in progress"));
        };
        // Each pick becomes one rewritten commit; squashes fold into the
        // preceding pick. The rewrite lives on compact-work until the swap.
        self.work_commits = Some(
            plan.iter()
                .filter(|r| r.action == "pick")
                .map(|r| format!("r{}", r.order))
                .collect(),
        );
        self.rebase_in_progress = false;
        if let Some(table) = self.corrupt_table_after_continue.take() {
            if let Some(rows) = self.tables.get_mut(&table) {
                *rows = rows.saturating_sub(1);
            }
        }
        Ok(())
    }

    async fn rebase_abort(&mut self) -> Result<(), StoreError> {
        self.record("rebase_abort")?;
        if !self.rebase_in_progress {
            return Err(StoreError::other("rebase_abort", "no rebase in progress"));
        }
        self.plan = None;
        self.rebase_in_progress = false;
        Ok(())
    }
}
