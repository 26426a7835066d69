// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gt_adapters::FakeBeads;
use gt_store::FakeStoreOps;

fn compactor(
    mode: CompactionMode,
    threshold: u64,
) -> (CompactorPatrol<FakeStoreOps, FakeBeads>, FakeStoreOps) {
    let store = FakeStoreOps::new();
    let beads = FakeBeads::new();
    let tracker = MoleculeTracker::new(beads);
    let patrol = CompactorPatrol::new(store.clone(), tracker, None, threshold, mode, 20);
    (patrol, store)
}

#[tokio::test]
async fn below_threshold_databases_are_skipped() {
    let (patrol, store) = compactor(CompactionMode::Flatten, 500);
    store.add_db("beads", 499, None);

    let compacted = patrol.compact_due(&CancellationToken::new()).await.unwrap();
    assert_eq!(compacted, 0);
    assert_eq!(store.call_count("flatten"), 0);
    assert_eq!(store.call_count("gc"), 0);
}

#[tokio::test]
async fn at_threshold_flattens_and_gcs() {
    let (patrol, store) = compactor(CompactionMode::Flatten, 500);
    store.add_db("beads", 500, None);
    store.add_db("quiet", 3, None);

    let compacted = patrol.compact_due(&CancellationToken::new()).await.unwrap();
    assert_eq!(compacted, 1);
    assert_eq!(store.call_count("flatten beads"), 1);
    assert_eq!(store.call_count("gc beads"), 1);
    assert_eq!(store.call_count("flatten quiet"), 0);
    assert_eq!(store.commits("beads"), Some(2), "history squashed");
}

#[tokio::test]
async fn surgical_mode_uses_keep_recent() {
    let (patrol, store) = compactor(CompactionMode::Surgical, 100);
    store.add_db("beads", 150, None);

    let compacted = patrol.compact_due(&CancellationToken::new()).await.unwrap();
    assert_eq!(compacted, 1);
    assert_eq!(store.call_count("surgical beads keep=20"), 1);
    assert_eq!(store.commits("beads"), Some(21), "keep window plus the fold");
}

#[tokio::test]
async fn gc_failure_does_not_undo_the_compaction() {
    let (patrol, store) = compactor(CompactionMode::Flatten, 100);
    store.add_db("beads", 200, None);
    store.set_fail_gc(true);

    let compacted = patrol.compact_due(&CancellationToken::new()).await.unwrap();
    assert_eq!(compacted, 1, "compaction still counts");
    assert_eq!(store.commits("beads"), Some(2));
}

#[tokio::test]
async fn compaction_failure_moves_on_to_next_database() {
    let (patrol, store) = compactor(CompactionMode::Flatten, 100);
    store.add_db("broken", 200, None);
    store.add_db("beads", 200, None);
    store.set_fail_flatten(true);

    let compacted = patrol.compact_due(&CancellationToken::new()).await.unwrap();
    assert_eq!(compacted, 0);
    assert_eq!(store.call_count("flatten"), 2, "both attempted");
}
