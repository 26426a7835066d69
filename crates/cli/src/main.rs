// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! gt - Gas Town CLI

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod commands;
mod exit_error;
mod town_config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{daemon, doctor, maintain, sling, tail};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "gt",
    version,
    about = "Gas Town - an orchestrator for fleets of coding agents"
)]
struct Cli {
    /// Town root override (default: $GT_TOWN_ROOT or ~/gt)
    #[arg(long, global = true, value_name = "DIR")]
    town: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Daemon management
    Daemon(daemon::DaemonArgs),
    /// One-shot maintenance: backup, reap, compact, gc
    Maintain(maintain::MaintainArgs),
    /// Dispatch a batch of beads to polecats on a rig
    Sling(sling::SlingArgs),
    /// Run the health checks once and print the report
    Doctor(doctor::DoctorArgs),
    /// Follow an agent's conversation log as an event stream
    Tail(tail::TailArgs),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        let code = e
            .downcast_ref::<exit_error::ExitError>()
            .map_or(1, |c| c.code);
        let msg = format!("{e:#}");
        if !msg.is_empty() {
            eprintln!("Error: {msg}");
        }
        std::process::exit(code);
    }
}

async fn run() -> Result<()> {
    setup_logging();
    let cli = Cli::parse();
    let town_root = cli
        .town
        .clone()
        .unwrap_or_else(gt_daemon::env::town_root);

    match cli.command {
        Commands::Daemon(args) => daemon::run(args, &town_root).await,
        Commands::Maintain(args) => maintain::run(args, &town_root).await,
        Commands::Sling(args) => sling::run(args, &town_root).await,
        Commands::Doctor(args) => doctor::run(args, &town_root).await,
        Commands::Tail(args) => tail::run(args).await,
    }
}

fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
