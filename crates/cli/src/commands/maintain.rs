// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot maintenance pipeline: plan → confirm → backup → reap →
//! compact → gc.

use anyhow::Result;
use clap::Args;
use gt_adapters::BdCli;
use gt_core::parse_duration;
use gt_daemon::patrol::BeadsPurger;
use gt_store::{maintain, MaintainOptions, StoreClient};
use std::io::{BufRead, Write};
use std::path::Path;

#[derive(Args)]
pub struct MaintainArgs {
    /// Skip the confirmation prompt
    #[arg(long)]
    force: bool,

    /// Only print the plan
    #[arg(long)]
    plan: bool,

    /// Flatten databases at or above this commit count
    #[arg(long, default_value_t = 100)]
    threshold: u64,

    /// Reap closed wisps older than this (e.g. 168h)
    #[arg(long, default_value = "168h")]
    delete_age: String,
}

pub async fn run(args: MaintainArgs, town_root: &Path) -> Result<()> {
    let delete_age = parse_duration(&args.delete_age)
        .map_err(|e| anyhow::anyhow!("invalid --delete-age: {e}"))?;
    let options = MaintainOptions {
        commit_threshold: args.threshold,
        delete_age,
        ..Default::default()
    };

    let store = StoreClient::new(gt_daemon::env::store_config());
    let purger = BeadsPurger(BdCli::new(town_root));

    let plan = maintain::plan(&store, &options)
        .await
        .map_err(|e| anyhow::anyhow!("could not build plan: {e}"))?;
    print!("{}", plan.render());

    if args.plan {
        return Ok(());
    }
    if !args.force && !confirm("Proceed?")? {
        println!("aborted");
        return Ok(());
    }

    let report = maintain::run(&store, &purger, &plan, &options).await;
    println!(
        "done: {} wisps reaped, {} database(s) flattened",
        report.total_reaped(),
        report.total_flattened()
    );
    for db in &report.databases {
        for error in &db.errors {
            println!("  {}: {}", db.name, error);
        }
    }
    if report.had_errors() {
        return Err(crate::exit_error::ExitError::new(1, "maintenance finished with errors").into());
    }
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}
