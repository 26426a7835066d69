// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level CLI specs: the `gt` binary's surface, run against a
//! throwaway town with no store behind it.

use assert_cmd::Command;
use tempfile::TempDir;

fn gt(town: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("gt").expect("gt binary");
    cmd.env("GT_TOWN_ROOT", town.path());
    // Nothing listens on port 1: every store access must fail fast.
    cmd.env("GT_STORE_PORT", "1");
    cmd
}

#[test]
fn help_lists_the_command_surface() {
    let town = TempDir::new().unwrap();
    let assert = gt(&town).arg("--help").assert().success();
    let out = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    for command in ["daemon", "maintain", "sling", "doctor", "tail"] {
        assert!(out.contains(command), "help mentions {command}: {out}");
    }
}

#[test]
fn sling_requires_beads_and_rig() {
    let town = TempDir::new().unwrap();
    gt(&town).arg("sling").assert().failure();
}

#[test]
fn sling_unknown_rig_names_known_rigs() {
    let town = TempDir::new().unwrap();
    std::fs::create_dir_all(town.path().join("rigs").join("gastown")).unwrap();

    let assert = gt(&town)
        .args(["sling", "gt-abc123", "citadel"])
        .assert()
        .failure();
    let err = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(err.contains("unknown rig 'citadel'"), "got: {err}");
    assert!(err.contains("gastown"), "lists known rigs: {err}");
}

#[test]
fn maintain_plan_fails_cleanly_without_a_store() {
    let town = TempDir::new().unwrap();
    let assert = gt(&town)
        .args(["maintain", "--plan"])
        .assert()
        .failure();
    let err = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(err.contains("could not build plan"), "got: {err}");
}

#[test]
fn doctor_reports_server_down_as_json() {
    let town = TempDir::new().unwrap();
    let assert = gt(&town).args(["doctor", "--json"]).assert().success();
    let out = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    let report: serde_json::Value = serde_json::from_str(&out).expect("valid JSON report");
    assert_eq!(report["tcp_reachable"], serde_json::json!(false));
    let recs = report["recommendations"].as_array().unwrap();
    assert!(recs
        .iter()
        .any(|r| r["action"] == "restart_server" && r["severity"] == "critical"));
}

#[test]
fn doctor_write_produces_the_report_file() {
    let town = TempDir::new().unwrap();
    gt(&town)
        .args(["doctor", "--json", "--write"])
        .assert()
        .success();
    assert!(town.path().join(".doctor-dog-report.json").exists());
}

#[test]
fn daemon_status_without_daemon() {
    let town = TempDir::new().unwrap();
    let assert = gt(&town).args(["daemon", "status"]).assert().success();
    let out = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(out.contains("not running"), "got: {out}");
}
