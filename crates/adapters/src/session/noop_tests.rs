// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::path::PathBuf;

#[tokio::test]
async fn noop_spawn_returns_prefixed_id() {
    let adapter = NoOpSessionAdapter::new();
    let id = adapter
        .spawn("rig-nux", &PathBuf::from("/"), "true", &[])
        .await
        .unwrap();
    assert_eq!(id, "gt-rig-nux");
}

#[tokio::test]
async fn noop_sessions_are_never_alive() {
    let adapter = NoOpSessionAdapter::new();
    assert!(!adapter.is_alive("gt-anything").await.unwrap());
    assert_eq!(adapter.get_exit_code("gt-anything").await.unwrap(), None);
    adapter.kill("gt-anything").await.unwrap();
}
