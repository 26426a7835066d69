// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batch dispatch of beads to polecats.

use crate::exit_error::ExitError;
use crate::town_config::load_town;
use anyhow::Result;
use clap::Args;
use gt_adapters::{BdCli, TmuxAdapter};
use gt_core::BeadId;
use gt_engine::{
    render_options, BatchDispatcher, BatchOptions, GitWorktrees, NamePool, SpawnPipeline,
    StoreBranches,
};
use gt_store::StoreClient;
use std::path::Path;
use std::sync::Arc;

#[derive(Args)]
pub struct SlingArgs {
    /// Bead IDs to dispatch (order-significant)
    #[arg(required = true)]
    beads: Vec<String>,

    /// Target rig
    #[arg(required = true)]
    rig: String,

    /// Override the cross-rig guard and molecule burn check
    #[arg(long)]
    force: bool,

    /// Base branch for work-trees (default: main)
    #[arg(long)]
    base: Option<String>,

    /// Agent command to run in each session
    #[arg(long)]
    agent: Option<String>,

    /// Formula to cook once and attach to every bead
    #[arg(long)]
    formula: Option<String>,

    /// Pause after every N successful spawns
    #[arg(long)]
    max_concurrent: Option<u32>,

    /// Merge strategy recorded on each bead
    #[arg(long)]
    merge_strategy: Option<String>,

    /// Mark beads as not-to-be-merged
    #[arg(long)]
    no_merge: bool,

    /// Extra arguments recorded for the polecats
    #[arg(long = "arg")]
    args: Vec<String>,
}

pub async fn run(args: SlingArgs, town_root: &Path) -> Result<()> {
    let town = Arc::new(load_town(town_root));
    if town.rig(&args.rig).is_none() {
        let known: Vec<String> = town.rigs().map(|r| r.name.clone()).collect();
        return Err(ExitError::new(
            1,
            format!(
                "unknown rig '{}' (known rigs: {})",
                args.rig,
                if known.is_empty() {
                    "none".to_string()
                } else {
                    known.join(", ")
                }
            ),
        )
        .into());
    }

    let beads = BdCli::new(town_root);
    let store = StoreClient::new(gt_daemon::env::store_config());
    let names = Arc::new(NamePool::load(town.name_pool_path(&args.rig)));
    let pipeline = SpawnPipeline::new(
        beads.clone(),
        TmuxAdapter::new(),
        GitWorktrees,
        StoreBranches(store),
        names,
        Arc::clone(&town),
    );
    let dispatcher = BatchDispatcher::new(pipeline, beads, town);

    let ids: Vec<BeadId> = args.beads.iter().map(|id| BeadId::new(id.as_str())).collect();
    let options = BatchOptions {
        force: args.force,
        base_branch: args.base,
        agent_type: args.agent,
        formula: args.formula,
        max_concurrent: args.max_concurrent,
        dispatcher: None,
        merge_strategy: args.merge_strategy,
        no_merge: args.no_merge,
        args: args.args,
    };

    match dispatcher.dispatch(&ids, &args.rig, &options).await {
        Ok(summary) => {
            println!("{summary}");
            if summary.all_failed() {
                return Err(ExitError::new(1, "no polecats spawned").into());
            }
            Ok(())
        }
        Err(e) => {
            let rendered = render_options(&e.to_string(), &e.options());
            Err(ExitError::new(1, rendered).into())
        }
    }
}
