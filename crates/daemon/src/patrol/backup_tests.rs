// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gt_adapters::FakeBeads;
use gt_store::FakeStoreOps;

#[tokio::test]
async fn syncs_only_databases_with_targets() {
    let store = FakeStoreOps::new();
    store.add_db("beads", 10, Some("beads-backup"));
    store.add_db("scratch", 10, None);
    let tracker = MoleculeTracker::new(FakeBeads::new());
    let patrol = DoltBackupPatrol::new(store.clone(), tracker, None);

    let synced = patrol.sync_all(&CancellationToken::new()).await.unwrap();
    assert_eq!(synced, 1);
    assert_eq!(store.call_count("backup_sync beads beads-backup"), 1);
    assert_eq!(store.call_count("backup_sync scratch"), 0);
}

#[tokio::test]
async fn sync_failures_do_not_abort_the_pass() {
    let store = FakeStoreOps::new();
    store.add_db("a", 10, Some("a-backup"));
    store.add_db("b", 10, Some("b-backup"));
    store.set_fail_backup(true);
    let tracker = MoleculeTracker::new(FakeBeads::new());
    let patrol = DoltBackupPatrol::new(store.clone(), tracker, None);

    let synced = patrol.sync_all(&CancellationToken::new()).await.unwrap();
    assert_eq!(synced, 0);
    assert_eq!(store.call_count("backup_sync"), 2, "both attempted");
}

#[tokio::test]
async fn jsonl_patrol_skips_missing_mirror() {
    let tmp = tempfile::TempDir::new().unwrap();
    let tracker = MoleculeTracker::new(FakeBeads::new());
    let patrol = JsonlBackupPatrol::new(tmp.path().join("nope"), tracker);

    patrol.run(&CancellationToken::new()).await.unwrap();
}
