// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Beads: durable work items and their ephemeral wisp sub-type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest (and clamp target) priority. Priorities run 0 (highest) to 4.
pub const PRIORITY_MAX: i64 = 4;

/// Identifier of a bead: `{rig-prefix}-{hash-suffix}` (e.g. `gt-1a2b3c`).
///
/// Bead IDs are minted by the external issue layer; the core never
/// generates them, it only parses the rig prefix back out.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BeadId(String);

impl BeadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The rig prefix of this ID (text before the last `-` separated
    /// hash suffix). IDs without a separator have no prefix.
    pub fn rig_prefix(&self) -> Option<&str> {
        self.0.rsplit_once('-').map(|(prefix, _)| prefix)
    }

    /// Short display form: the hash suffix truncated to `n` characters.
    pub fn short(&self, n: usize) -> &str {
        let suffix = self
            .0
            .rsplit_once('-')
            .map(|(_, s)| s)
            .unwrap_or(self.0.as_str());
        &suffix[..suffix.len().min(n)]
    }
}

impl fmt::Display for BeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BeadId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for BeadId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for BeadId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Bead status. Wisps share the column: a wisp is a bead whose life is
/// bounded by a molecule run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeadStatus {
    Open,
    Hooked,
    Pinned,
    InProgress,
    Closed,
}

impl BeadStatus {
    /// Statuses a molecule close must force-close (the orphan backstop).
    pub fn is_open_like(&self) -> bool {
        matches!(
            self,
            BeadStatus::Open | BeadStatus::Hooked | BeadStatus::InProgress
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BeadStatus::Open => "open",
            BeadStatus::Hooked => "hooked",
            BeadStatus::Pinned => "pinned",
            BeadStatus::InProgress => "in_progress",
            BeadStatus::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(BeadStatus::Open),
            "hooked" => Some(BeadStatus::Hooked),
            "pinned" => Some(BeadStatus::Pinned),
            "in_progress" => Some(BeadStatus::InProgress),
            "closed" => Some(BeadStatus::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for BeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A work item as read from the issue layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bead {
    pub id: BeadId,
    pub title: String,
    pub status: BeadStatus,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub description: String,
}

/// Clamp a priority into the valid 0..=4 range.
///
/// Out-of-range values in either direction clamp to 4 (lowest), so a
/// malformed negative priority never outranks real work.
pub fn clamp_priority(priority: i64) -> i64 {
    if (0..=PRIORITY_MAX).contains(&priority) {
        priority
    } else {
        PRIORITY_MAX
    }
}

/// Dispatch score for a priority. Strictly decreasing from P0 to P4;
/// the P0 bonus applies only to an exact 0, never to clamped negatives.
pub fn priority_score(priority: i64) -> u32 {
    let clamped = clamp_priority(priority);
    let base = ((PRIORITY_MAX - clamped) * 10) as u32;
    if priority == 0 {
        base + 5
    } else {
        base
    }
}

#[cfg(test)]
#[path = "bead_tests.rs"]
mod tests;
