// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process listing for the doctor's zombie check.

use crate::subprocess::{run_with_timeout, PS_TIMEOUT};
use tokio::process::Command;

/// One process as reported by `ps`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub command: String,
}

/// Enumerate all processes (pid + full command line).
pub async fn list_processes() -> Result<Vec<ProcessInfo>, String> {
    let mut cmd = Command::new("ps");
    cmd.args(["-eo", "pid=,args="]);
    let output = run_with_timeout(cmd, PS_TIMEOUT, "ps").await?;
    if !output.status.success() {
        return Err(format!(
            "ps exited nonzero: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(parse_ps_output(&String::from_utf8_lossy(&output.stdout)))
}

fn parse_ps_output(stdout: &str) -> Vec<ProcessInfo> {
    stdout
        .lines()
        .filter_map(|line| {
            let trimmed = line.trim_start();
            let (pid_str, rest) = trimmed.split_once(char::is_whitespace)?;
            let pid = pid_str.parse().ok()?;
            Some(ProcessInfo {
                pid,
                command: rest.trim().to_string(),
            })
        })
        .collect()
}

/// Filter for sql-server processes that look orphaned: command line
/// contains the store binary plus "sql-server", but not the flag an
/// expected, supervised server would carry.
pub fn find_zombie_sql_servers<'a>(
    processes: &'a [ProcessInfo],
    binary: &str,
    expected_port_flag: &str,
) -> Vec<&'a ProcessInfo> {
    processes
        .iter()
        .filter(|p| p.command.contains(binary) && p.command.contains("sql-server"))
        .filter(|p| !p.command.contains(expected_port_flag))
        .collect()
}

#[cfg(test)]
#[path = "proc_tests.rs"]
mod tests;
