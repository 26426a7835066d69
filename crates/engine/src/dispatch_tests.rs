// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::names::NamePool;
use crate::test_support::{FakeBranches, FakeWorktrees};
use crate::town::RigInfo;
use gt_adapters::{FakeBeads, FakeSessionAdapter};
use gt_core::test_support::BeadBuilder;
use gt_core::BeadStatus;
use tempfile::TempDir;

struct Harness {
    dispatcher: BatchDispatcher<FakeBeads, FakeSessionAdapter, FakeWorktrees, FakeBranches>,
    beads: FakeBeads,
    sessions: FakeSessionAdapter,
    worktrees: FakeWorktrees,
    _tmp: TempDir,
}

fn harness() -> Harness {
    let tmp = TempDir::new().unwrap();
    let beads = FakeBeads::new();
    let sessions = FakeSessionAdapter::new();
    let worktrees = FakeWorktrees::new();
    let branches = FakeBranches::new();
    let names = std::sync::Arc::new(NamePool::load(tmp.path().join("pool.json")));

    let mut town = TownContext::new(tmp.path());
    town.add_rig(RigInfo {
        name: "gastown".to_string(),
        prefix: "gt".to_string(),
        repo: tmp.path().join("repo"),
        database: "gastown_beads".to_string(),
    });
    town.add_rig(RigInfo {
        name: "bullet-farm".to_string(),
        prefix: "bf".to_string(),
        repo: tmp.path().join("bf-repo"),
        database: "bullet_farm_beads".to_string(),
    });
    let town = std::sync::Arc::new(town);

    let pipeline = SpawnPipeline::new(
        beads.clone(),
        sessions.clone(),
        worktrees.clone(),
        branches,
        names,
        std::sync::Arc::clone(&town),
    );
    let dispatcher = BatchDispatcher::new(pipeline, beads.clone(), town);

    Harness {
        dispatcher,
        beads,
        sessions,
        worktrees,
        _tmp: tmp,
    }
}

fn seed(h: &Harness, ids: &[&str]) -> Vec<BeadId> {
    for id in ids {
        h.beads.insert(BeadBuilder::new(*id).build());
    }
    ids.iter().map(|id| BeadId::new(*id)).collect()
}

fn fast() {
    std::env::set_var("GT_SLING_DELAY_MS", "0");
    std::env::set_var("GT_SLING_RELAX_MS", "0");
}

fn unfast() {
    std::env::remove_var("GT_SLING_DELAY_MS");
    std::env::remove_var("GT_SLING_RELAX_MS");
}

#[tokio::test]
#[serial_test::serial]
async fn batch_spawns_each_unit_and_tracks_them_all() {
    fast();
    let h = harness();
    let ids = seed(&h, &["gt-000001", "gt-000002", "gt-000003"]);

    let summary = h
        .dispatcher
        .dispatch(&ids, "gastown", &BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.succeeded.len(), 3);
    assert!(summary.failed.is_empty());
    let convoy = summary.convoy.clone().unwrap();
    assert_eq!(summary.tracked.len(), 3);

    // The convoy's dependency edges exist and every bead is stamped.
    assert_eq!(h.beads.child_ids(convoy.as_str()).len(), 3);
    for id in &ids {
        let fields = gt_core::attachment::AttachmentFields::parse(
            &h.beads.bead(id.as_str()).unwrap().description,
        );
        assert_eq!(fields.convoy.as_deref(), Some(convoy.as_str()));
    }
    assert_eq!(h.sessions.live_sessions().len(), 3);
    unfast();
}

// E2E: batch [A-001, B-001, A-002] to rig A; B-001 belongs to rig B.
// Nothing spawns, the message names the offender, three options offered.
#[tokio::test]
#[serial_test::serial]
async fn cross_rig_mismatch_rejects_the_whole_batch() {
    fast();
    let h = harness();
    let ids = seed(&h, &["gt-000001", "bf-000001", "gt-000002"]);

    let err = h
        .dispatcher
        .dispatch(&ids, "gastown", &BatchOptions::default())
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("bf-000001"), "names the offender: {message}");
    assert!(message.contains("bullet-farm"));
    let options = err.options();
    assert_eq!(options.len(), 3);
    assert!(options.iter().any(|o| o.contains("--force")));
    assert!(options.iter().any(|o| o.contains("gt sling bf-000001 bullet-farm")));

    // No side effects at all
    assert!(h.worktrees.created().is_empty(), "no work-tree created");
    assert!(h.sessions.live_sessions().is_empty(), "no polecats spawned");
    assert_eq!(
        h.beads
            .call_count(|c| matches!(c, gt_adapters::BeadsCall::Create { .. })),
        0,
        "not even the convoy exists"
    );
    unfast();
}

#[tokio::test]
#[serial_test::serial]
async fn unknown_ids_reject_before_any_spawn() {
    fast();
    let h = harness();
    let mut ids = seed(&h, &["gt-000001"]);
    ids.push(BeadId::new("gt-missing"));

    let err = h
        .dispatcher
        .dispatch(&ids, "gastown", &BatchOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::NotFound(ref missing) if missing.len() == 1));
    assert!(h.sessions.live_sessions().is_empty());
    unfast();
}

#[tokio::test]
#[serial_test::serial]
async fn failed_dependency_edge_leaves_bead_unstamped() {
    fast();
    let h = harness();
    let ids = seed(&h, &["gt-000001", "gt-000002"]);
    h.beads.fail_dep_for("gt-000002");

    let summary = h
        .dispatcher
        .dispatch(&ids, "gastown", &BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.succeeded.len(), 2, "spawn still happens");
    assert!(summary.tracked.contains(&BeadId::new("gt-000001")));
    assert!(!summary.tracked.contains(&BeadId::new("gt-000002")));

    let stamped = gt_core::attachment::AttachmentFields::parse(
        &h.beads.bead("gt-000001").unwrap().description,
    );
    assert!(stamped.convoy.is_some());
    let unstamped = gt_core::attachment::AttachmentFields::parse(
        &h.beads.bead("gt-000002").unwrap().description,
    );
    assert_eq!(unstamped.convoy, None);
    unfast();
}

#[tokio::test]
#[serial_test::serial]
async fn full_batch_failure_closes_the_convoy() {
    fast();
    let h = harness();
    let ids = seed(&h, &["gt-000001", "gt-000002"]);
    h.sessions.set_fail_spawn(true);

    let summary = h
        .dispatcher
        .dispatch(&ids, "gastown", &BatchOptions::default())
        .await
        .unwrap();

    assert!(summary.all_failed());
    assert_eq!(summary.convoy, None);
    // The convoy bead itself was closed with a reason
    let convoy_id = h
        .beads
        .calls()
        .iter()
        .find_map(|c| match c {
            gt_adapters::BeadsCall::Create { .. } => None,
            gt_adapters::BeadsCall::Close { id, reason } if id.starts_with("hq-") => {
                Some((id.clone(), reason.clone()))
            }
            _ => None,
        })
        .expect("convoy closed");
    assert!(convoy_id.1.unwrap().contains("all 2 spawns failed"));
    unfast();
}

#[tokio::test]
#[serial_test::serial]
async fn formula_is_cooked_once_for_the_batch() {
    fast();
    let h = harness();
    let ids = seed(&h, &["gt-000001", "gt-000002", "gt-000003"]);
    h.beads.register_formula("mol-polecat", &["Scan the bead"]);

    let options = BatchOptions {
        formula: Some("mol-polecat".to_string()),
        ..Default::default()
    };
    let summary = h.dispatcher.dispatch(&ids, "gastown", &options).await.unwrap();
    assert_eq!(summary.succeeded.len(), 3);

    let cooks = h
        .beads
        .call_count(|c| matches!(c, gt_adapters::BeadsCall::Cook(_)));
    assert_eq!(cooks, 1, "pre-cooked once, reused per unit");
    let attaches = h
        .beads
        .call_count(|c| matches!(c, gt_adapters::BeadsCall::Attach { .. }));
    assert_eq!(attaches, 3);
    unfast();
}

#[tokio::test]
#[serial_test::serial]
async fn partial_failure_keeps_convoy_and_reports_both() {
    fast();
    let h = harness();
    let ids = seed(&h, &["gt-000001", "gt-000002"]);
    // Second spawn fails at hook exhaustion
    std::env::set_var("GT_HOOK_RETRY_MS", "1");

    // Fail only the second unit: script transient failures to start after
    // the first unit's single successful hook call.
    let summary = {
        let h2 = &h;
        // First spawn consumes no failures; then make hooks fail forever.
        let first = h2
            .dispatcher
            .dispatch(&ids[..1], "gastown", &BatchOptions::default())
            .await
            .unwrap();
        assert_eq!(first.succeeded.len(), 1);
        h2.beads.set_hook_transient_failures(100);
        h2.dispatcher
            .dispatch(&ids[1..], "gastown", &BatchOptions::default())
            .await
            .unwrap()
    };

    assert_eq!(summary.succeeded.len(), 0);
    assert_eq!(summary.failed.len(), 1);
    assert!(summary.failed[0].1.contains("hook"));
    std::env::remove_var("GT_HOOK_RETRY_MS");
    unfast();
}

#[test]
fn render_options_numbers_the_block() {
    let text = render_options(
        "bead gt-1 belongs elsewhere",
        &["Remove it".to_string(), "Use --force".to_string()],
    );
    assert!(text.contains("Options:"));
    assert!(text.contains("1. Remove it"));
    assert!(text.contains("2. Use --force"));
}
