// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

#[test]
fn claim_hands_out_distinct_theme_names() {
    let dir = TempDir::new().unwrap();
    let pool = NamePool::load(dir.path().join("pool.json"));

    let a = pool.claim();
    let b = pool.claim();
    assert_ne!(a, b);
    assert!(DEFAULT_THEME.contains(&a.as_str()));
    assert!(pool.in_use().contains(&a));
    assert!(pool.in_use().contains(&b));
}

#[test]
fn release_makes_a_name_reclaimable() {
    let dir = TempDir::new().unwrap();
    let pool = NamePool::load(dir.path().join("pool.json"));

    let a = pool.claim();
    pool.release(&a);
    assert!(!pool.in_use().contains(&a));
    let again = pool.claim();
    assert_eq!(again, a, "released name is first in theme order again");
}

#[test]
fn exhausted_pool_falls_back_to_overflow_names() {
    let dir = TempDir::new().unwrap();
    let pool = NamePool::load(dir.path().join("pool.json"));

    for _ in 0..DEFAULT_THEME.len() {
        pool.claim();
    }
    let overflow = pool.claim();
    assert_eq!(overflow, "spare-1");
    let overflow2 = pool.claim();
    assert_eq!(overflow2, "spare-2");
}

#[test]
fn state_survives_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pool.json");

    let claimed = {
        let pool = NamePool::load(&path);
        pool.claim()
    };

    let reloaded = NamePool::load(&path);
    assert!(
        reloaded.in_use().contains(&claimed),
        "persisted in-use set survives restart"
    );
    let next = reloaded.claim();
    assert_ne!(next, claimed);
}

#[test]
fn corrupt_pool_file_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pool.json");
    std::fs::write(&path, "{definitely not json").unwrap();

    let pool = NamePool::load(&path);
    let name = pool.claim();
    assert!(DEFAULT_THEME.contains(&name.as_str()));
}
