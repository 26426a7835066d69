// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::fake::{FakeStoreOps, FakeWispPurge};
use super::*;

fn town_store() -> FakeStoreOps {
    let store = FakeStoreOps::new();
    store.add_db("beads", 250, Some("beads-backup"));
    store.add_db("wisps", 40, None);
    store
}

#[tokio::test]
async fn plan_lists_databases_with_commit_counts() {
    let store = town_store();
    let options = MaintainOptions::default();
    let plan = plan(&store, &options).await.unwrap();

    assert_eq!(plan.databases.len(), 2);
    let beads = plan.databases.iter().find(|d| d.name == "beads").unwrap();
    assert_eq!(beads.commits, 250);
    assert_eq!(beads.backup_target.as_deref(), Some("beads-backup"));
    assert!(beads.needs_flatten(plan.commit_threshold));

    let wisps = plan.databases.iter().find(|d| d.name == "wisps").unwrap();
    assert!(!wisps.needs_flatten(plan.commit_threshold));
    assert_eq!(wisps.backup_target, None);
}

#[tokio::test]
async fn run_backs_up_reaps_flattens_and_gcs() {
    let store = town_store();
    let purger = FakeWispPurge::new();
    purger.set_count("beads", 12);
    purger.set_count("wisps", 3);
    let options = MaintainOptions::default();
    let built = plan(&store, &options).await.unwrap();

    let report = run(&store, &purger, &built, &options).await;

    assert_eq!(report.total_reaped(), 15);
    assert_eq!(report.total_flattened(), 1, "only beads crosses 100 commits");
    assert!(!report.had_errors());

    let beads = report.databases.iter().find(|d| d.name == "beads").unwrap();
    assert_eq!(beads.backed_up, Some(true));
    assert!(beads.flattened);
    assert_eq!(beads.commits_removed, 248);
    assert!(beads.gc_ok);

    let wisps = report.databases.iter().find(|d| d.name == "wisps").unwrap();
    assert_eq!(wisps.backed_up, None, "no target, no sync attempted");
    assert!(!wisps.flattened);
    assert!(wisps.gc_ok);

    // Reap ran live, not dry
    assert!(purger.calls().iter().all(|(_, _, dry)| !dry));
}

#[tokio::test]
async fn run_records_per_db_failures_without_aborting() {
    let store = town_store();
    store.set_fail_backup(true);
    store.set_fail_flatten(true);
    let purger = FakeWispPurge::new();
    purger.fail_for("beads");
    let options = MaintainOptions::default();
    let built = plan(&store, &options).await.unwrap();

    let report = run(&store, &purger, &built, &options).await;

    assert!(report.had_errors());
    let beads = report.databases.iter().find(|d| d.name == "beads").unwrap();
    assert_eq!(beads.backed_up, Some(false));
    assert!(!beads.flattened);
    assert_eq!(beads.errors.len(), 3, "backup, reap, and flatten all recorded");
    // The sweep still reached the second database
    assert_eq!(report.databases.len(), 2);
    assert!(report.databases.iter().all(|d| d.gc_ok));
}

#[tokio::test]
async fn gc_failure_is_recorded_but_not_fatal() {
    let store = town_store();
    store.set_fail_gc(true);
    let purger = FakeWispPurge::new();
    let options = MaintainOptions::default();
    let built = plan(&store, &options).await.unwrap();

    let report = run(&store, &purger, &built, &options).await;
    assert!(report.databases.iter().all(|d| !d.gc_ok));
    assert_eq!(report.total_flattened(), 1, "flatten still happened");
}

#[test]
fn plan_render_mentions_every_database() {
    let plan = MaintainPlan {
        databases: vec![
            DbPlan {
                name: "beads".to_string(),
                commits: 250,
                backup_target: Some("beads-backup".to_string()),
            },
            DbPlan {
                name: "wisps".to_string(),
                commits: 7,
                backup_target: None,
            },
        ],
        commit_threshold: 100,
    };
    let text = plan.render();
    assert!(text.contains("beads"));
    assert!(text.contains("wisps"));
    assert!(text.contains("flatten (250 commits)"));
    assert!(text.contains("skip flatten (7 commits)"));
}

#[test]
fn default_threshold_is_lower_than_patrol_threshold() {
    assert_eq!(MaintainOptions::default().commit_threshold, 100);
}
