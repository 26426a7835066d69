// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;
use yare::parameterized;

fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

#[parameterized(
    daily = { "daily", Refire::Daily },
    weekly = { "Weekly", Refire::Weekly },
    monthly = { "monthly", Refire::Monthly },
    duration = { "12h", Refire::Every(Duration::from_secs(12 * 3600)) },
)]
fn refire_parses(input: &str, expected: Refire) {
    assert_eq!(Refire::parse(input).unwrap(), expected);
}

#[test]
fn refire_rejects_garbage() {
    assert!(Refire::parse("fortnightly").is_err());
}

#[test]
fn window_rejects_bad_time() {
    assert!(MaintenanceWindow::new("25:99", Refire::Daily).is_err());
    assert!(MaintenanceWindow::new("03:00", Refire::Daily).is_ok());
}

#[test]
fn fires_on_first_tick_past_the_window() {
    let mut window = MaintenanceWindow::new("03:00", Refire::Daily).unwrap();

    assert!(!window.should_fire(local(2026, 2, 1, 2, 59)), "before the window");
    assert!(window.should_fire(local(2026, 2, 1, 3, 1)), "first tick past 03:00");
    assert!(
        !window.should_fire(local(2026, 2, 1, 3, 2)),
        "already fired today"
    );
    assert!(
        !window.should_fire(local(2026, 2, 1, 23, 0)),
        "still the same day"
    );
}

#[test]
fn daily_window_fires_again_tomorrow() {
    let mut window = MaintenanceWindow::new("03:00", Refire::Daily).unwrap();
    assert!(window.should_fire(local(2026, 2, 1, 3, 0)));
    assert!(window.should_fire(local(2026, 2, 2, 3, 0)), "next day fires");
}

#[test]
fn weekly_window_skips_intermediate_days() {
    let mut window = MaintenanceWindow::new("03:00", Refire::Weekly).unwrap();
    assert!(window.should_fire(local(2026, 2, 1, 3, 5)));
    assert!(!window.should_fire(local(2026, 2, 3, 3, 5)), "two days later: gated");
    assert!(window.should_fire(local(2026, 2, 8, 3, 5)), "a week later: fires");
}

#[test]
fn duration_refire_gates_by_elapsed_time() {
    let mut window =
        MaintenanceWindow::new("00:00", Refire::Every(Duration::from_secs(12 * 3600))).unwrap();
    assert!(window.should_fire(local(2026, 2, 1, 1, 0)));
    assert!(!window.should_fire(local(2026, 2, 1, 8, 0)), "7h later: gated");
    // Next day, past the 12h gap and past the new window
    assert!(window.should_fire(local(2026, 2, 2, 1, 0)));
}

#[tokio::test]
async fn patrol_noops_outside_the_window() {
    use gt_adapters::FakeBeads;
    use gt_store::{FakeStoreOps, FakeWispPurge};

    let store = FakeStoreOps::new();
    store.add_db("beads", 2000, None);
    let purger = FakeWispPurge::new();
    let tracker = MoleculeTracker::new(FakeBeads::new());

    // A window that already fired "now": the next run must not touch the
    // store.
    let mut window = MaintenanceWindow::new("00:00", Refire::Daily).unwrap();
    assert!(window.should_fire(Local::now()));
    let patrol =
        ScheduledMaintenancePatrol::new(store.clone(), purger, tracker, window, MaintainOptions {
            commit_threshold: 1000,
            ..Default::default()
        });

    patrol.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(store.call_count("flatten"), 0, "window closed, nothing ran");
}

#[tokio::test]
async fn patrol_runs_maintenance_inside_the_window() {
    use gt_adapters::FakeBeads;
    use gt_store::{FakeStoreOps, FakeWispPurge};

    let store = FakeStoreOps::new();
    store.add_db("beads", 2000, None);
    store.add_db("quiet", 10, None);
    let purger = FakeWispPurge::new();
    purger.set_count("beads", 9);
    let tracker = MoleculeTracker::new(FakeBeads::new());

    let window = MaintenanceWindow::new("00:00", Refire::Daily).unwrap();
    let patrol = ScheduledMaintenancePatrol::new(
        store.clone(),
        purger,
        tracker,
        window,
        MaintainOptions {
            commit_threshold: 1000,
            ..Default::default()
        },
    );

    patrol.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(store.call_count("flatten beads"), 1, "past-threshold db flattened");
    assert_eq!(store.call_count("flatten quiet"), 0);
    assert_eq!(store.call_count("gc"), 2, "gc runs for every db");
}
