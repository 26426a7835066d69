// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot health probe.

use anyhow::Result;
use clap::Args;
use gt_daemon::patrol::doctor::{write_report, Doctor, DoctorConfig};
use gt_store::StoreClient;
use std::path::Path;

#[derive(Args)]
pub struct DoctorArgs {
    /// Print the raw report JSON instead of a summary
    #[arg(long)]
    json: bool,

    /// Also write the report file under the town root
    #[arg(long)]
    write: bool,
}

pub async fn run(args: DoctorArgs, town_root: &Path) -> Result<()> {
    let store_config = gt_daemon::env::store_config();
    let doctor = Doctor::new(
        StoreClient::new(store_config.clone()),
        DoctorConfig::new(town_root, &store_config.host, store_config.port),
    );

    let report = doctor.examine().await;

    if args.write {
        let path = write_report(town_root, &report)?;
        eprintln!("report written to {}", path.display());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "server: {}",
        if report.tcp_reachable { "reachable" } else { "DOWN" }
    );
    if report.latency.error.is_empty() {
        println!("latency: {}ms", report.latency.ms);
    } else {
        println!("latency: check failed ({})", report.latency.error);
    }
    if report.databases.error.is_empty() {
        println!("databases: {}", report.databases.count);
    } else {
        println!("databases: check failed ({})", report.databases.error);
    }
    println!("zombie sql-servers: {}", report.zombies.processes.len());
    match (&report.backup_age.age_seconds, report.backup_age.missing) {
        (_, true) => println!("backups: missing"),
        (Some(age), _) => println!("backups: newest {}s old", age),
        (None, _) => println!("backups: unknown"),
    }

    if report.recommendations.is_empty() {
        println!("no recommendations");
    } else {
        println!("recommendations:");
        for rec in &report.recommendations {
            println!("  [{:?}] {}: {}", rec.severity, rec.action, rec.reason);
        }
    }
    Ok(())
}
