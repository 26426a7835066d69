// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn parses_ps_lines() {
    let out = "  123 dolt sql-server --port 3306\n 4567 /usr/bin/vim notes.md\nbadline\n";
    let procs = parse_ps_output(out);
    assert_eq!(procs.len(), 2);
    assert_eq!(procs[0].pid, 123);
    assert_eq!(procs[0].command, "dolt sql-server --port 3306");
    assert_eq!(procs[1].pid, 4567);
}

#[test]
fn zombie_filter_excludes_expected_port() {
    let procs = vec![
        ProcessInfo {
            pid: 1,
            command: "dolt sql-server --port 3306".to_string(),
        },
        ProcessInfo {
            pid: 2,
            command: "dolt sql-server".to_string(),
        },
        ProcessInfo {
            pid: 3,
            command: "dolt gc".to_string(),
        },
        ProcessInfo {
            pid: 4,
            command: "postgres sql-server-ish".to_string(),
        },
    ];
    let zombies = find_zombie_sql_servers(&procs, "dolt", "--port 3306");
    assert_eq!(zombies.len(), 1);
    assert_eq!(zombies[0].pid, 2);
}

#[tokio::test]
async fn list_processes_sees_ourselves() {
    let procs = list_processes().await.unwrap();
    assert!(!procs.is_empty());
    let my_pid = std::process::id();
    assert!(procs.iter().any(|p| p.pid == my_pid));
}
