// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon patrol configuration (`<town-root>/mayor/daemon.json`).
//!
//! The file is read at startup and rewritten only by the ensure-defaults
//! path. Merging is one-directional: a value the user has set is never
//! overwritten, only absent fields are filled in.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Top-level `type` discriminator of the config file.
pub const CONFIG_FILE_TYPE: &str = "daemon-patrol-config";

pub const PATROL_REAPER: &str = "wisp_reaper";
pub const PATROL_COMPACTOR: &str = "compactor_dog";
pub const PATROL_DOCTOR: &str = "doctor_dog";
pub const PATROL_JSONL_BACKUP: &str = "jsonl_git_backup";
pub const PATROL_DOLT_BACKUP: &str = "dolt_backup";
pub const PATROL_SCHEDULED_MAINTENANCE: &str = "scheduled_maintenance";
pub const PATROL_DEACON: &str = "deacon";
pub const PATROL_REFINERY: &str = "refinery";
pub const PATROL_WITNESS: &str = "witness";

/// Compaction algorithm selection for the compactor patrol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompactionMode {
    #[default]
    Flatten,
    Surgical,
}

/// Per-patrol settings. All fields optional so defaults can be merged in
/// without disturbing user values; unknown keys are preserved for
/// forward compatibility with renamed settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatrolSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    /// Closed wisps older than this are reaped (e.g. "168h").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_age: Option<String>,
    /// Compaction fires only at or above this commit count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_threshold: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<CompactionMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_recent: Option<u64>,
    /// Databases the patrol covers; `None` means enumerate at run time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub databases: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_threshold_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orphan_threshold: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_age_secs: Option<u64>,
    /// Time-of-day window for scheduled maintenance ("HH:MM").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl PatrolSettings {
    fn fill_from(&mut self, defaults: &PatrolSettings) {
        if self.enabled.is_none() {
            self.enabled = defaults.enabled;
        }
        if self.interval.is_none() {
            self.interval.clone_from(&defaults.interval);
        }
        if self.delete_age.is_none() {
            self.delete_age.clone_from(&defaults.delete_age);
        }
        if self.commit_threshold.is_none() {
            self.commit_threshold = defaults.commit_threshold;
        }
        if self.mode.is_none() {
            self.mode = defaults.mode;
        }
        if self.keep_recent.is_none() {
            self.keep_recent = defaults.keep_recent;
        }
        if self.databases.is_none() {
            self.databases.clone_from(&defaults.databases);
        }
        if self.latency_threshold_ms.is_none() {
            self.latency_threshold_ms = defaults.latency_threshold_ms;
        }
        if self.orphan_threshold.is_none() {
            self.orphan_threshold = defaults.orphan_threshold;
        }
        if self.backup_age_secs.is_none() {
            self.backup_age_secs = defaults.backup_age_secs;
        }
        if self.at.is_none() {
            self.at.clone_from(&defaults.at);
        }
    }
}

/// The daemon's patrol configuration tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: u32,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub patrols: BTreeMap<String, PatrolSettings>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            kind: CONFIG_FILE_TYPE.to_string(),
            version: 1,
            env: BTreeMap::new(),
            patrols: BTreeMap::new(),
            extra: BTreeMap::new(),
        }
    }
}

impl DaemonConfig {
    /// Path of the config file under a town root.
    pub fn path(town_root: &Path) -> PathBuf {
        town_root.join("mayor").join("daemon.json")
    }

    /// Load the config, or a default tree when the file is missing.
    pub fn load(town_root: &Path) -> Result<Self, CoreError> {
        let path = Self::path(town_root);
        let text = match std::fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => return Err(CoreError::Io(e)),
        };
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| CoreError::Config(format!("{}: {}", path.display(), e)))?;
        if config.kind != CONFIG_FILE_TYPE {
            return Err(CoreError::Config(format!(
                "{}: unexpected type {:?}",
                path.display(),
                config.kind
            )));
        }
        Ok(config)
    }

    /// Write the config atomically (temp file + rename).
    pub fn save(&self, town_root: &Path) -> Result<(), CoreError> {
        let path = Self::path(town_root);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| CoreError::Config(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Whether a patrol is enabled. Missing patrols are disabled: the
    /// catalog is opt-in except for what `ensure_lifecycle_defaults` seeds.
    pub fn is_enabled(&self, patrol: &str) -> bool {
        self.patrols
            .get(patrol)
            .and_then(|p| p.enabled)
            .unwrap_or(false)
    }

    pub fn patrol(&self, name: &str) -> PatrolSettings {
        self.patrols.get(name).cloned().unwrap_or_default()
    }

    /// Seed the lifecycle patrols with their documented defaults.
    ///
    /// Fills only absent fields; a value the user has set (including an
    /// explicit `enabled: false`) stays untouched. Returns true when
    /// anything changed (caller then persists).
    pub fn ensure_lifecycle_defaults(&mut self) -> bool {
        let before = self.patrols.clone();
        for (name, defaults) in lifecycle_defaults() {
            self.patrols
                .entry(name.to_string())
                .or_default()
                .fill_from(&defaults);
        }
        self.patrols != before
    }
}

/// Documented defaults for the lifecycle patrols seeded at first boot.
pub fn lifecycle_defaults() -> Vec<(&'static str, PatrolSettings)> {
    vec![
        (
            PATROL_REAPER,
            PatrolSettings {
                enabled: Some(true),
                interval: Some("30m".to_string()),
                delete_age: Some("168h".to_string()),
                ..Default::default()
            },
        ),
        (
            PATROL_COMPACTOR,
            PatrolSettings {
                enabled: Some(true),
                interval: Some("24h".to_string()),
                commit_threshold: Some(500),
                mode: Some(CompactionMode::Flatten),
                ..Default::default()
            },
        ),
        (
            PATROL_DOCTOR,
            PatrolSettings {
                enabled: Some(true),
                interval: Some("5m".to_string()),
                ..Default::default()
            },
        ),
        (
            PATROL_JSONL_BACKUP,
            PatrolSettings {
                enabled: Some(true),
                interval: Some("15m".to_string()),
                ..Default::default()
            },
        ),
        (
            PATROL_DOLT_BACKUP,
            PatrolSettings {
                enabled: Some(true),
                interval: Some("15m".to_string()),
                ..Default::default()
            },
        ),
        (
            PATROL_SCHEDULED_MAINTENANCE,
            PatrolSettings {
                enabled: Some(true),
                interval: Some("daily".to_string()),
                at: Some("03:00".to_string()),
                commit_threshold: Some(1000),
                ..Default::default()
            },
        ),
    ]
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
