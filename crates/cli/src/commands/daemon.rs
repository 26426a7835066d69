// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon management

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::Path;

#[derive(Args)]
pub struct DaemonArgs {
    #[command(subcommand)]
    command: DaemonCommand,
}

#[derive(Subcommand)]
enum DaemonCommand {
    /// Start gtd in the background
    Start,
    /// Show whether a daemon holds the town lock
    Status,
}

pub async fn run(args: DaemonArgs, town_root: &Path) -> Result<()> {
    match args.command {
        DaemonCommand::Start => start(town_root).await,
        DaemonCommand::Status => status(town_root),
    }
}

async fn start(town_root: &Path) -> Result<()> {
    let binary = std::env::var("GT_DAEMON_BINARY").unwrap_or_else(|_| "gtd".to_string());
    let child = std::process::Command::new(&binary)
        .env("GT_TOWN_ROOT", town_root)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .with_context(|| format!("could not start {binary}"))?;
    println!("gtd started (pid {})", child.id());
    Ok(())
}

fn status(town_root: &Path) -> Result<()> {
    let config = gt_daemon::Config::new(town_root.to_path_buf());
    // Probing the lock is the truth; the file alone may be stale.
    match gt_daemon::lifecycle::acquire_lock(&config) {
        Ok(_guard) => println!("gtd not running"),
        Err(gt_daemon::LifecycleError::LockFailed(_)) => {
            match gt_daemon::lifecycle::lock_holder_pid(&config) {
                Some(pid) => println!("gtd running (pid {pid})"),
                None => println!("gtd running"),
            }
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
