// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gt_adapters::FakeSessionAdapter;

#[tokio::test]
async fn reports_dead_and_missing_sessions() {
    let sessions = FakeSessionAdapter::new();
    sessions.add_session("gt-gastown-deacon", true);
    sessions.add_session("gt-bullet-farm-deacon", false);
    // citadel has no session at all

    let patrol = RolePatrol::new(
        Role::Deacon,
        vec![
            "gastown".to_string(),
            "bullet-farm".to_string(),
            "citadel".to_string(),
        ],
        sessions,
    );

    let absent = patrol.absent_sessions().await;
    assert_eq!(
        absent,
        vec![
            "gt-bullet-farm-deacon".to_string(),
            "gt-citadel-deacon".to_string()
        ]
    );
    assert_eq!(patrol.name(), "deacon");
}

#[tokio::test]
async fn role_patrol_run_never_fails() {
    let patrol = RolePatrol::new(Role::Witness, vec!["gastown".to_string()], FakeSessionAdapter::new());
    patrol.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(patrol.name(), "witness");
}
