// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent identity: who is acting, in which rig, under which session.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Agent roles. Scope rate limits, patrol assignments, and telemetry tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Mayor,
    Deacon,
    Witness,
    Refinery,
    Crew,
    Polecat,
    Boot,
    Dog,
    Unknown,
}

impl Role {
    /// Case-insensitive parse; anything unrecognized is `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "mayor" => Role::Mayor,
            "deacon" => Role::Deacon,
            "witness" => Role::Witness,
            "refinery" => Role::Refinery,
            "crew" => Role::Crew,
            "polecat" => Role::Polecat,
            "boot" => Role::Boot,
            "dog" => Role::Dog,
            _ => Role::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Mayor => "mayor",
            Role::Deacon => "deacon",
            Role::Witness => "witness",
            Role::Refinery => "refinery",
            Role::Crew => "crew",
            Role::Polecat => "polecat",
            Role::Boot => "boot",
            Role::Dog => "dog",
            Role::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identity tuple for a running agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub rig: String,
    pub role: Role,
    /// Polecat name drawn from the rig's theme pool; `None` for the
    /// singleton role agents (mayor, deacon, ...).
    pub polecat: Option<String>,
    pub session: String,
}

impl AgentIdentity {
    pub fn polecat(rig: impl Into<String>, name: impl Into<String>) -> Self {
        let rig = rig.into();
        let name = name.into();
        let session = format!("gt-{}-{}", rig, name);
        Self {
            rig,
            role: Role::Polecat,
            polecat: Some(name),
            session,
        }
    }

    pub fn role_agent(rig: impl Into<String>, role: Role) -> Self {
        let rig = rig.into();
        let session = format!("gt-{}-{}", rig, role);
        Self {
            rig,
            role,
            polecat: None,
            session,
        }
    }

    /// The `rig/name` form used for dispatcher stamps and hook owners.
    pub fn handle(&self) -> String {
        match &self.polecat {
            Some(name) => format!("{}/{}", self.rig, name),
            None => format!("{}/{}", self.rig, self.role),
        }
    }
}

impl fmt::Display for AgentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.handle())
    }
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
