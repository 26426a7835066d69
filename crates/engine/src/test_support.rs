// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake work-tree and store-branch ops for pipeline tests.
#![cfg_attr(coverage_nightly, coverage(off))]

use crate::spawn::{BranchOps, WorktreeOps};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Default)]
struct WorktreeState {
    existing: BTreeSet<PathBuf>,
    fail_create: bool,
    created: Vec<(PathBuf, String, String)>,
    removed: Vec<PathBuf>,
}

/// Fake [`WorktreeOps`] recording creations and removals.
#[derive(Clone, Default)]
pub struct FakeWorktrees {
    inner: Arc<Mutex<WorktreeState>>,
}

impl FakeWorktrees {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.inner.lock().fail_create = fail;
    }

    pub fn existing(&self) -> BTreeSet<PathBuf> {
        self.inner.lock().existing.clone()
    }

    pub fn created(&self) -> Vec<(PathBuf, String, String)> {
        self.inner.lock().created.clone()
    }

    pub fn removed(&self) -> Vec<PathBuf> {
        self.inner.lock().removed.clone()
    }
}

#[async_trait]
impl WorktreeOps for FakeWorktrees {
    async fn create(
        &self,
        _repo: &Path,
        worktree: &Path,
        branch: &str,
        base: &str,
    ) -> Result<(), String> {
        let mut inner = self.inner.lock();
        if inner.fail_create {
            return Err("scripted worktree failure".to_string());
        }
        inner.existing.insert(worktree.to_path_buf());
        inner
            .created
            .push((worktree.to_path_buf(), branch.to_string(), base.to_string()));
        Ok(())
    }

    async fn remove(&self, _repo: &Path, worktree: &Path) -> Result<(), String> {
        let mut inner = self.inner.lock();
        inner.existing.remove(worktree);
        inner.removed.push(worktree.to_path_buf());
        Ok(())
    }
}

#[derive(Default)]
struct BranchState {
    existing: BTreeSet<(String, String)>,
    fail_create: bool,
}

/// Fake [`BranchOps`] tracking which isolation branches exist.
#[derive(Clone, Default)]
pub struct FakeBranches {
    inner: Arc<Mutex<BranchState>>,
}

impl FakeBranches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.inner.lock().fail_create = fail;
    }

    pub fn existing(&self) -> BTreeSet<(String, String)> {
        self.inner.lock().existing.clone()
    }
}

#[async_trait]
impl BranchOps for FakeBranches {
    async fn create_branch(&self, db: &str, name: &str) -> Result<(), String> {
        let mut inner = self.inner.lock();
        if inner.fail_create {
            return Err("scripted branch failure".to_string());
        }
        inner.existing.insert((db.to_string(), name.to_string()));
        Ok(())
    }

    async fn delete_branch(&self, db: &str, name: &str) -> Result<(), String> {
        self.inner
            .lock()
            .existing
            .remove(&(db.to_string(), name.to_string()));
        Ok(())
    }
}
