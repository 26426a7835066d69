// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

#[test]
fn empty_town_has_no_rigs() {
    let town = TempDir::new().unwrap();
    let loaded = load_town(town.path());
    assert_eq!(loaded.rigs().count(), 0);
}

#[test]
fn rig_defaults_derive_from_directory_name() {
    let town = TempDir::new().unwrap();
    std::fs::create_dir_all(town.path().join("rigs").join("bullet-farm")).unwrap();

    let loaded = load_town(town.path());
    let rig = loaded.rig("bullet-farm").unwrap();
    assert_eq!(rig.prefix, "bullet-farm");
    assert_eq!(rig.database, "bullet_farm_beads");
    assert!(rig.repo.ends_with("rigs/bullet-farm/repo"));
}

#[test]
fn rig_json_overrides_prefix_and_database() {
    let town = TempDir::new().unwrap();
    let rig_dir = town.path().join("rigs").join("gastown");
    std::fs::create_dir_all(&rig_dir).unwrap();
    std::fs::write(
        rig_dir.join("rig.json"),
        r#"{"prefix": "gt", "database": "gastown_db"}"#,
    )
    .unwrap();

    let loaded = load_town(town.path());
    let rig = loaded.rig("gastown").unwrap();
    assert_eq!(rig.prefix, "gt");
    assert_eq!(rig.database, "gastown_db");
}
