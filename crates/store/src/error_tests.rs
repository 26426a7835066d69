// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;
use yare::parameterized;

#[parameterized(
    rebase_failed = { "Rebase Execution Failed at step 3", true },
    concurrency = { "concurrency abort detected", true },
    graph = { "commit GRAPH changed under us", true },
    cannot_rebase = { "Cannot rebase: dirty working set", true },
    lock_wait = { "Lock wait timeout exceeded", false },
    connection = { "connection refused", false },
    empty = { "", false },
)]
fn classifies_concurrent_write_messages(message: &str, expected: bool) {
    assert_eq!(is_concurrent_write_message(message), expected);
}

#[test]
fn timeout_kind_is_distinct() {
    let err = StoreError::Timeout {
        operation: "row_counts".to_string(),
        after: Duration::from_secs(30),
    };
    assert!(err.is_timeout());
    assert!(!err.is_concurrent_write());
    assert!(err.to_string().contains("row_counts"));
}

#[test]
fn other_kind_carries_operation() {
    let err = StoreError::other("dolt_gc", "gc already in progress");
    assert!(!err.is_timeout());
    assert!(!err.is_concurrent_write());
    assert_eq!(err.to_string(), "dolt_gc failed: gc already in progress");
}
