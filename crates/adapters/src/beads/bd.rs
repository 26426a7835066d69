// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `bd` CLI implementation of the issue-layer adapter.
//!
//! Invocations follow bd's positional verb-object style; `--json` output
//! is parsed, plain output is treated as lines. Exit 0 with empty stdout
//! means "not found".

use super::{AgentBeadState, BeadsAdapter, BeadsError};
use crate::env;
use crate::subprocess::{run_with_timeout, BD_TIMEOUT};
use async_trait::async_trait;
use gt_core::{AgentIdentity, Bead, BeadId, BeadStatus};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;

/// Message fragments indicating a retryable store hiccup.
const TRANSIENT_MARKERS: &[&str] = &["database is locked", "lock wait", "connection refused", "try again"];

fn is_transient_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    TRANSIENT_MARKERS.iter().any(|m| lower.contains(m))
}

/// Issue-layer adapter backed by the external `bd` binary.
#[derive(Clone)]
pub struct BdCli {
    binary: String,
    town_root: PathBuf,
}

impl BdCli {
    pub fn new(town_root: impl Into<PathBuf>) -> Self {
        Self {
            binary: env::bd_binary(),
            town_root: town_root.into(),
        }
    }

    /// Run `bd` with the given args; non-zero exit becomes an error.
    async fn run(&self, args: &[&str]) -> Result<String, BeadsError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args).current_dir(&self.town_root);
        let description = format!("bd {}", args.first().unwrap_or(&""));
        let output = run_with_timeout(cmd, BD_TIMEOUT, &description)
            .await
            .map_err(BeadsError::Tool)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if is_transient_message(&stderr) {
                return Err(BeadsError::Transient(stderr));
            }
            return Err(BeadsError::Tool(format!("{}: {}", description, stderr)));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn run_json(&self, args: &[&str]) -> Result<Option<serde_json::Value>, BeadsError> {
        let stdout = self.run(args).await?;
        if stdout.is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&stdout)
            .map(Some)
            .map_err(|e| BeadsError::Json(format!("{}: {}", e, stdout)))
    }

    fn extract_id(value: &serde_json::Value, key: &str) -> Result<BeadId, BeadsError> {
        value
            .get(key)
            .and_then(|v| v.as_str())
            .map(BeadId::new)
            .ok_or_else(|| BeadsError::Json(format!("missing field {:?} in {}", key, value)))
    }
}

#[async_trait]
impl BeadsAdapter for BdCli {
    async fn show(&self, id: &BeadId) -> Result<Option<Bead>, BeadsError> {
        let Some(value) = self.run_json(&["show", id.as_str(), "--json"]).await? else {
            return Ok(None);
        };
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| BeadsError::Json(e.to_string()))
    }

    async fn create(
        &self,
        title: &str,
        description: &str,
        priority: i64,
    ) -> Result<BeadId, BeadsError> {
        let priority = priority.to_string();
        let value = self
            .run_json(&[
                "create",
                "--title",
                title,
                "--description",
                description,
                "--priority",
                &priority,
                "--json",
            ])
            .await?
            .ok_or_else(|| BeadsError::Json("bd create returned no output".to_string()))?;
        Self::extract_id(&value, "id")
    }

    async fn set_status(&self, id: &BeadId, status: BeadStatus) -> Result<(), BeadsError> {
        self.run(&["update", id.as_str(), "--status", status.as_str()])
            .await
            .map(|_| ())
    }

    async fn update_description(&self, id: &BeadId, description: &str) -> Result<(), BeadsError> {
        self.run(&["update", id.as_str(), "--description", description])
            .await
            .map(|_| ())
    }

    async fn close(&self, id: &BeadId, reason: Option<&str>) -> Result<(), BeadsError> {
        match reason {
            Some(reason) => self.run(&["close", id.as_str(), "--reason", reason]).await,
            None => self.run(&["close", id.as_str()]).await,
        }
        .map(|_| ())
    }

    async fn children(&self, id: &BeadId) -> Result<Vec<Bead>, BeadsError> {
        let Some(value) = self.run_json(&["children", id.as_str(), "--json"]).await? else {
            return Ok(Vec::new());
        };
        serde_json::from_value(value).map_err(|e| BeadsError::Json(e.to_string()))
    }

    async fn add_dependency(&self, parent: &BeadId, child: &BeadId) -> Result<(), BeadsError> {
        self.run(&["dep", "add", parent.as_str(), child.as_str()])
            .await
            .map(|_| ())
    }

    async fn cook_formula(&self, formula: &str) -> Result<String, BeadsError> {
        let value = self
            .run_json(&["formula", "cook", formula, "--json"])
            .await?
            .ok_or_else(|| BeadsError::NotFound(format!("formula {}", formula)))?;
        value
            .get("cooked")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| BeadsError::Json(format!("missing field \"cooked\" in {}", value)))
    }

    async fn pour(
        &self,
        cooked: &str,
        vars: &BTreeMap<String, String>,
    ) -> Result<BeadId, BeadsError> {
        let mut args: Vec<String> = vec!["mol".into(), "pour".into(), cooked.into()];
        for (key, value) in vars {
            args.push("--var".into());
            args.push(format!("{}={}", key, value));
        }
        args.push("--json".into());
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let value = self
            .run_json(&arg_refs)
            .await?
            .ok_or_else(|| BeadsError::Json("bd mol pour returned no output".to_string()))?;
        Self::extract_id(&value, "root")
    }

    async fn attach_formula(&self, cooked: &str, bead: &BeadId) -> Result<BeadId, BeadsError> {
        let value = self
            .run_json(&["mol", "attach", cooked, bead.as_str(), "--json"])
            .await?
            .ok_or_else(|| BeadsError::NotFound(bead.to_string()))?;
        Self::extract_id(&value, "root")
    }

    async fn hook(&self, id: &BeadId, owner: &AgentIdentity) -> Result<(), BeadsError> {
        let handle = owner.handle();
        self.run(&["hook", id.as_str(), "--owner", &handle])
            .await
            .map(|_| ())
    }

    async fn create_agent(&self, identity: &AgentIdentity) -> Result<BeadId, BeadsError> {
        let role = identity.role.as_str();
        let value = self
            .run_json(&[
                "agent",
                "create",
                &identity.session,
                "--rig",
                &identity.rig,
                "--role",
                role,
                "--json",
            ])
            .await?
            .ok_or_else(|| BeadsError::Json("bd agent create returned no output".to_string()))?;
        Self::extract_id(&value, "id")
    }

    async fn set_agent_state(
        &self,
        agent: &BeadId,
        state: AgentBeadState,
    ) -> Result<(), BeadsError> {
        self.run(&["agent", "state", agent.as_str(), state.as_str()])
            .await
            .map(|_| ())
    }

    async fn purge_closed_wisps(
        &self,
        db: &str,
        older_than: Duration,
        dry_run: bool,
    ) -> Result<u64, BeadsError> {
        let age = format!("{}h", older_than.as_secs() / 3600);
        let mut args = vec!["wisp", "purge", "--db", db, "--older-than", age.as_str()];
        if dry_run {
            args.push("--dry-run");
        }
        args.push("--json");
        let value = self
            .run_json(&args)
            .await?
            .ok_or_else(|| BeadsError::Json("bd wisp purge returned no output".to_string()))?;
        value
            .get("purged")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| BeadsError::Json(format!("missing field \"purged\" in {}", value)))
    }
}

#[cfg(test)]
#[path = "bd_tests.rs"]
mod tests;
