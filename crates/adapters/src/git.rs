// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git helpers: backup-mirror inspection and polecat work-trees.

use crate::subprocess::{run_with_timeout, GIT_QUERY_TIMEOUT, GIT_WORKTREE_TIMEOUT};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::process::Command;

async fn git(repo: &Path, args: &[&str], timeout: Duration, description: &str) -> Result<std::process::Output, String> {
    let mut cmd = Command::new("git");
    cmd.arg("-C").arg(repo).args(args);
    run_with_timeout(cmd, timeout, description).await
}

/// Age of the latest commit in `repo`, or `None` when the repo has no
/// commits yet.
pub async fn last_commit_age(repo: &Path) -> Result<Option<Duration>, String> {
    let output = git(repo, &["log", "-1", "--format=%ct"], GIT_QUERY_TIMEOUT, "git log").await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("does not have any commits") {
            return Ok(None);
        }
        return Err(format!("git log failed: {}", stderr.trim()));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let epoch_secs: u64 = stdout
        .trim()
        .parse()
        .map_err(|e| format!("unparseable commit timestamp {:?}: {}", stdout.trim(), e))?;
    let commit_time = UNIX_EPOCH + Duration::from_secs(epoch_secs);
    Ok(Some(
        SystemTime::now()
            .duration_since(commit_time)
            .unwrap_or(Duration::ZERO),
    ))
}

/// Stage everything and commit. Returns false when there was nothing to
/// commit.
pub async fn commit_all(repo: &Path, message: &str) -> Result<bool, String> {
    let add = git(repo, &["add", "-A"], GIT_QUERY_TIMEOUT, "git add").await?;
    if !add.status.success() {
        return Err(format!(
            "git add failed: {}",
            String::from_utf8_lossy(&add.stderr).trim()
        ));
    }
    let commit = git(
        repo,
        &["commit", "-m", message],
        GIT_QUERY_TIMEOUT,
        "git commit",
    )
    .await?;
    if commit.status.success() {
        return Ok(true);
    }
    let stdout = String::from_utf8_lossy(&commit.stdout);
    let stderr = String::from_utf8_lossy(&commit.stderr);
    if stdout.contains("nothing to commit") || stderr.contains("nothing to commit") {
        return Ok(false);
    }
    Err(format!("git commit failed: {}", stderr.trim()))
}

/// Create a work-tree for a polecat off `base` on a new branch.
pub async fn worktree_add(
    repo: &Path,
    worktree: &Path,
    branch: &str,
    base: &str,
) -> Result<(), String> {
    let worktree_str = worktree.to_string_lossy().to_string();
    let output = git(
        repo,
        &["worktree", "add", "-b", branch, &worktree_str, base],
        GIT_WORKTREE_TIMEOUT,
        "git worktree add",
    )
    .await?;
    if !output.status.success() {
        return Err(format!(
            "git worktree add failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(())
}

/// Remove a polecat work-tree (force: the polecat may have left dirt).
pub async fn worktree_remove(repo: &Path, worktree: &Path) -> Result<(), String> {
    let worktree_str = worktree.to_string_lossy().to_string();
    let output = git(
        repo,
        &["worktree", "remove", "--force", &worktree_str],
        GIT_WORKTREE_TIMEOUT,
        "git worktree remove",
    )
    .await?;
    if !output.status.success() {
        return Err(format!(
            "git worktree remove failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(())
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
