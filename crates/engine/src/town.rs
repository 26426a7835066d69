// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Town context: the workspace root and its rigs.
//!
//! Injected into the pipelines instead of living in ambient globals, so
//! each component takes only the slice it needs and tests can build a
//! throwaway town.

use gt_core::BeadId;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One rig: a named project with its repo, bead prefix, and database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RigInfo {
    pub name: String,
    /// Bead-ID prefix owned by this rig (e.g. `gt` for `gt-1a2b3c`).
    pub prefix: String,
    pub repo: PathBuf,
    pub database: String,
}

/// The workspace root and its registered rigs.
#[derive(Debug, Clone, Default)]
pub struct TownContext {
    root: PathBuf,
    rigs: BTreeMap<String, RigInfo>,
}

impl TownContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            rigs: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn add_rig(&mut self, rig: RigInfo) {
        self.rigs.insert(rig.name.clone(), rig);
    }

    pub fn rig(&self, name: &str) -> Option<&RigInfo> {
        self.rigs.get(name)
    }

    pub fn rigs(&self) -> impl Iterator<Item = &RigInfo> {
        self.rigs.values()
    }

    /// Resolve the rig owning a bead by its ID prefix.
    pub fn rig_for_bead(&self, id: &BeadId) -> Option<&RigInfo> {
        let prefix = id.rig_prefix()?;
        self.rigs.values().find(|r| r.prefix == prefix)
    }

    /// Where a rig's polecat work-trees live.
    pub fn polecats_dir(&self, rig: &str) -> PathBuf {
        self.root.join("rigs").join(rig).join("polecats")
    }

    /// Where the rig name pools are persisted.
    pub fn name_pool_path(&self, rig: &str) -> PathBuf {
        self.root.join("rigs").join(rig).join("name-pool.json")
    }
}

#[cfg(test)]
#[path = "town_tests.rs"]
mod tests;
