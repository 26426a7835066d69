// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gt_core::BeadStatus;
use gt_adapters::FakeBeads;
use yare::parameterized;

#[parameterized(
    exact = { "reap", Some("reap") },
    substring = { "Reap closed wisps", Some("reap") },
    case_insensitive = { "BACKUP the JSONL mirror", Some("backup") },
    hyphenated = { "auto-close stale beads", Some("auto-close") },
    offsite = { "push offsite copy", Some("push") },
    no_match = { "frobnicate the widgets", None },
)]
fn slug_matching(title: &str, expected: Option<&str>) {
    assert_eq!(slug_for_title(title), expected);
}

fn tracker_with_formula(steps: &[&str]) -> (MoleculeTracker<FakeBeads>, FakeBeads) {
    let beads = FakeBeads::new();
    beads.register_formula("wisp-reaper", steps);
    (MoleculeTracker::new(beads.clone()), beads)
}

#[tokio::test]
async fn pour_maps_children_to_slugs() {
    let (tracker, _beads) =
        tracker_with_formula(&["Scan databases", "Reap closed wisps", "Report results"]);
    let handle = tracker.pour("wisp-reaper", &Default::default()).await;
    assert!(!handle.is_noop());
    assert!(handle.root_id().is_some());
}

#[tokio::test]
async fn close_step_closes_the_matching_wisp() {
    let (tracker, beads) = tracker_with_formula(&["Scan databases", "Reap closed wisps"]);
    let handle = tracker.pour("wisp-reaper", &Default::default()).await;

    handle.close_step("reap").await;

    let root = handle.root_id().unwrap().to_string();
    let children = beads.child_ids(&root);
    let reap_child = children
        .iter()
        .find(|id| beads.bead(id).unwrap().title.contains("Reap"))
        .unwrap();
    assert_eq!(beads.status_of(reap_child), Some(BeadStatus::Closed));
    let scan_child = children
        .iter()
        .find(|id| beads.bead(id).unwrap().title.contains("Scan"))
        .unwrap();
    assert_eq!(beads.status_of(scan_child), Some(BeadStatus::Open));
}

#[tokio::test]
async fn fail_step_records_a_reason() {
    let (tracker, beads) = tracker_with_formula(&["Backup the store"]);
    let handle = tracker.pour("wisp-reaper", &Default::default()).await;

    handle.fail_step("backup", "remote unreachable").await;

    let root = handle.root_id().unwrap().to_string();
    let child = &beads.child_ids(&root)[0];
    assert_eq!(
        beads.close_reason(child),
        Some(Some("remote unreachable".to_string()))
    );
}

// Property: after close(), every direct child of the root is closed,
// even when the patrol body never called close_step.
#[tokio::test]
async fn close_force_closes_orphaned_steps() {
    let (tracker, beads) =
        tracker_with_formula(&["Scan databases", "Reap closed wisps", "Report results"]);
    let handle = tracker.pour("wisp-reaper", &Default::default()).await;
    let root = handle.root_id().unwrap().to_string();

    handle.close_step("scan").await;
    handle.close().await;

    for child in beads.child_ids(&root) {
        assert_eq!(
            beads.status_of(&child),
            Some(BeadStatus::Closed),
            "child {} must be closed",
            child
        );
    }
    assert_eq!(beads.status_of(&root), Some(BeadStatus::Closed));
}

// Property: a degraded handle (failed pour) is a no-op that never
// errors.
#[tokio::test]
async fn degraded_handle_is_silent_noop() {
    let beads = FakeBeads::new();
    beads.set_fail_pour(true);
    beads.register_formula("wisp-reaper", &["Scan databases"]);
    let tracker = MoleculeTracker::new(beads.clone());

    let handle = tracker.pour("wisp-reaper", &Default::default()).await;
    assert!(handle.is_noop());
    assert_eq!(handle.root_id(), None);

    // None of these may fail or create records
    handle.close_step("scan").await;
    handle.fail_step("scan", "whatever").await;
    handle.close().await;

    let close_calls = beads.call_count(|c| matches!(c, gt_adapters::BeadsCall::Close { .. }));
    assert_eq!(close_calls, 0);
}

#[tokio::test]
async fn missing_formula_also_degrades() {
    let beads = FakeBeads::new();
    let tracker = MoleculeTracker::new(beads.clone());
    let handle = tracker.pour("never-registered", &Default::default()).await;
    assert!(handle.is_noop());
}

#[tokio::test]
async fn duplicate_slug_titles_last_write_wins() {
    let (tracker, beads) = tracker_with_formula(&["Verify counts", "verify swap"]);
    let handle = tracker.pour("wisp-reaper", &Default::default()).await;
    let root = handle.root_id().unwrap().to_string();

    handle.close_step("verify").await;

    let children = beads.child_ids(&root);
    // The second child holds the mapping; the first stays open until the
    // orphan backstop runs.
    assert_eq!(beads.status_of(&children[1]), Some(BeadStatus::Closed));
    assert_eq!(beads.status_of(&children[0]), Some(BeadStatus::Open));
}
