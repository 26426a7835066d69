// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn town() -> TownContext {
    let mut town = TownContext::new("/town");
    town.add_rig(RigInfo {
        name: "gastown".to_string(),
        prefix: "gt".to_string(),
        repo: PathBuf::from("/town/rigs/gastown/repo"),
        database: "gastown_beads".to_string(),
    });
    town.add_rig(RigInfo {
        name: "bullet-farm".to_string(),
        prefix: "bf".to_string(),
        repo: PathBuf::from("/town/rigs/bullet-farm/repo"),
        database: "bullet_farm_beads".to_string(),
    });
    town
}

#[test]
fn rig_for_bead_resolves_by_prefix() {
    let town = town();
    assert_eq!(
        town.rig_for_bead(&BeadId::new("gt-1a2b3c")).map(|r| r.name.as_str()),
        Some("gastown")
    );
    assert_eq!(
        town.rig_for_bead(&BeadId::new("bf-9f8e7d")).map(|r| r.name.as_str()),
        Some("bullet-farm")
    );
    assert_eq!(town.rig_for_bead(&BeadId::new("xx-000000")), None);
    assert_eq!(town.rig_for_bead(&BeadId::new("noprefix")), None);
}

#[test]
fn paths_are_rooted_in_the_town() {
    let town = town();
    assert_eq!(
        town.polecats_dir("gastown"),
        PathBuf::from("/town/rigs/gastown/polecats")
    );
    assert_eq!(
        town.name_pool_path("gastown"),
        PathBuf::from("/town/rigs/gastown/name-pool.json")
    );
}
