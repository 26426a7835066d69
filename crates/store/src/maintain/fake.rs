// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake store-level operations for maintain and patrol tests.
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{StoreOps, WispPurge};
use crate::compact::{CompactionError, CompactionOutcome};
use crate::error::StoreError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
struct FakeDb {
    commits: u64,
    backup_target: Option<String>,
}

#[derive(Default)]
struct FakeStoreState {
    databases: BTreeMap<String, FakeDb>,
    calls: Vec<String>,
    fail_backup: bool,
    fail_flatten: bool,
    fail_gc: bool,
    latency: Duration,
    fail_latency: bool,
}

/// Fake [`StoreOps`] with scriptable per-operation failures.
#[derive(Clone, Default)]
pub struct FakeStoreOps {
    inner: Arc<Mutex<FakeStoreState>>,
}

impl FakeStoreOps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_db(&self, name: &str, commits: u64, backup_target: Option<&str>) {
        self.inner.lock().databases.insert(
            name.to_string(),
            FakeDb {
                commits,
                backup_target: backup_target.map(String::from),
            },
        );
    }

    pub fn set_fail_backup(&self, fail: bool) {
        self.inner.lock().fail_backup = fail;
    }

    pub fn set_fail_flatten(&self, fail: bool) {
        self.inner.lock().fail_flatten = fail;
    }

    pub fn set_fail_gc(&self, fail: bool) {
        self.inner.lock().fail_gc = fail;
    }

    pub fn set_latency(&self, latency: Duration) {
        self.inner.lock().latency = latency;
    }

    pub fn set_fail_latency(&self, fail: bool) {
        self.inner.lock().fail_latency = fail;
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().calls.clone()
    }

    pub fn call_count(&self, prefix: &str) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn commits(&self, db: &str) -> Option<u64> {
        self.inner.lock().databases.get(db).map(|d| d.commits)
    }

    fn record(&self, call: String) {
        self.inner.lock().calls.push(call);
    }
}

#[async_trait]
impl StoreOps for FakeStoreOps {
    async fn databases(&self) -> Result<Vec<String>, StoreError> {
        self.record("databases".to_string());
        Ok(self.inner.lock().databases.keys().cloned().collect())
    }

    async fn count_commits(&self, db: &str) -> Result<u64, StoreError> {
        self.record(format!("count_commits {}", db));
        self.inner
            .lock()
            .databases
            .get(db)
            .map(|d| d.commits)
            .ok_or_else(|| StoreError::other("count_commits", format!("unknown database {}", db)))
    }

    async fn backup_target(&self, db: &str) -> Result<Option<String>, StoreError> {
        self.record(format!("backup_target {}", db));
        Ok(self
            .inner
            .lock()
            .databases
            .get(db)
            .and_then(|d| d.backup_target.clone()))
    }

    async fn backup_sync(&self, db: &str, target: &str, _deadline: Duration) -> Result<(), StoreError> {
        self.record(format!("backup_sync {} {}", db, target));
        if self.inner.lock().fail_backup {
            return Err(StoreError::other("backup_sync", "remote unreachable"));
        }
        Ok(())
    }

    async fn flatten(&self, db: &str) -> Result<CompactionOutcome, CompactionError> {
        self.record(format!("flatten {}", db));
        let mut inner = self.inner.lock();
        if inner.fail_flatten {
            return Err(CompactionError::Integrity {
                db: db.to_string(),
                detail: "scripted failure".to_string(),
            });
        }
        let entry = inner
            .databases
            .get_mut(db)
            .ok_or_else(|| StoreError::other("flatten", format!("unknown database {}", db)))?;
        let before = entry.commits;
        entry.commits = 2;
        Ok(CompactionOutcome {
            db: db.to_string(),
            commits_before: before,
            commits_after: 2,
            squashed: 0,
            skipped: false,
        })
    }

    async fn surgical(&self, db: &str, keep_recent: u64) -> Result<CompactionOutcome, CompactionError> {
        self.record(format!("surgical {} keep={}", db, keep_recent));
        let mut inner = self.inner.lock();
        let entry = inner
            .databases
            .get_mut(db)
            .ok_or_else(|| StoreError::other("surgical", format!("unknown database {}", db)))?;
        let before = entry.commits;
        let after = (keep_recent + 1).min(before);
        let squashed = before.saturating_sub(after);
        entry.commits = after;
        Ok(CompactionOutcome {
            db: db.to_string(),
            commits_before: before,
            commits_after: after,
            squashed,
            skipped: squashed == 0,
        })
    }

    async fn gc(&self, db: &str) -> Result<(), StoreError> {
        self.record(format!("gc {}", db));
        if self.inner.lock().fail_gc {
            return Err(StoreError::other("dolt_gc", "gc already running"));
        }
        Ok(())
    }

    async fn latency(&self) -> Result<Duration, StoreError> {
        self.record("latency".to_string());
        let inner = self.inner.lock();
        if inner.fail_latency {
            return Err(StoreError::other("latency", "connection refused"));
        }
        Ok(inner.latency)
    }
}

#[derive(Default)]
struct FakePurgeState {
    counts: BTreeMap<String, u64>,
    fail_dbs: Vec<String>,
    calls: Vec<(String, Duration, bool)>,
}

/// Fake [`WispPurge`] recording calls and returning scripted counts.
#[derive(Clone, Default)]
pub struct FakeWispPurge {
    inner: Arc<Mutex<FakePurgeState>>,
}

impl FakeWispPurge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_count(&self, db: &str, count: u64) {
        self.inner.lock().counts.insert(db.to_string(), count);
    }

    pub fn fail_for(&self, db: &str) {
        self.inner.lock().fail_dbs.push(db.to_string());
    }

    pub fn calls(&self) -> Vec<(String, Duration, bool)> {
        self.inner.lock().calls.clone()
    }
}

#[async_trait]
impl WispPurge for FakeWispPurge {
    async fn purge_closed(
        &self,
        db: &str,
        older_than: Duration,
        dry_run: bool,
    ) -> Result<u64, String> {
        let mut inner = self.inner.lock();
        inner.calls.push((db.to_string(), older_than, dry_run));
        if inner.fail_dbs.iter().any(|d| d == db) {
            return Err(format!("bd purge failed for {}", db));
        }
        Ok(inner.counts.get(db).copied().unwrap_or(0))
    }
}
