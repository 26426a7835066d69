// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rig discovery for CLI commands.
//!
//! A rig is a directory under `<town-root>/rigs`; its optional
//! `rig.json` carries the bead prefix and database name, defaulting to
//! the rig name itself.

use gt_engine::{RigInfo, TownContext};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
struct RigFile {
    #[serde(default)]
    prefix: Option<String>,
    #[serde(default)]
    database: Option<String>,
}

/// Build a [`TownContext`] from the rigs on disk.
pub fn load_town(town_root: &Path) -> TownContext {
    let mut town = TownContext::new(town_root);
    let Ok(entries) = std::fs::read_dir(town_root.join("rigs")) else {
        return town;
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let rig_file: RigFile = std::fs::read_to_string(path.join("rig.json"))
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default();
        town.add_rig(RigInfo {
            prefix: rig_file.prefix.unwrap_or_else(|| name.clone()),
            database: rig_file
                .database
                .unwrap_or_else(|| format!("{}_beads", name.replace('-', "_"))),
            repo: path.join("repo"),
            name,
        });
    }
    town
}

#[cfg(test)]
#[path = "town_config_tests.rs"]
mod tests;
