// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

async fn init_repo(dir: &Path) {
    for args in [
        vec!["init", "-b", "main"],
        vec!["config", "user.email", "test@example.com"],
        vec!["config", "user.name", "Test"],
    ] {
        let mut cmd = tokio::process::Command::new("git");
        cmd.arg("-C").arg(dir).args(&args);
        let out = cmd.output().await.unwrap();
        assert!(out.status.success(), "git {:?} failed", args);
    }
}

#[tokio::test]
async fn last_commit_age_none_for_empty_repo() {
    let dir = TempDir::new().unwrap();
    init_repo(dir.path()).await;
    let age = last_commit_age(dir.path()).await.unwrap();
    assert_eq!(age, None);
}

#[tokio::test]
async fn commit_all_then_age_is_recent() {
    let dir = TempDir::new().unwrap();
    init_repo(dir.path()).await;
    std::fs::write(dir.path().join("wisps.jsonl"), "{}\n").unwrap();

    let committed = commit_all(dir.path(), "mirror sync").await.unwrap();
    assert!(committed);

    let age = last_commit_age(dir.path()).await.unwrap().unwrap();
    assert!(age < Duration::from_secs(60), "fresh commit, got {age:?}");

    // Second commit with no changes reports nothing-to-commit
    let committed = commit_all(dir.path(), "mirror sync").await.unwrap();
    assert!(!committed);
}

#[tokio::test]
async fn worktree_add_and_remove_round_trip() {
    let dir = TempDir::new().unwrap();
    init_repo(dir.path()).await;
    std::fs::write(dir.path().join("README.md"), "rig\n").unwrap();
    commit_all(dir.path(), "init").await.unwrap();

    let wt = dir.path().join("polecats").join("nux");
    worktree_add(dir.path(), &wt, "polecat/nux", "main")
        .await
        .unwrap();
    assert!(wt.join("README.md").exists());

    worktree_remove(dir.path(), &wt).await.unwrap();
    assert!(!wt.exists());
}
