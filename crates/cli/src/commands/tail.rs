// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream an agent's conversation log as typed events.

use anyhow::Result;
use clap::Args;
use gt_adapters::{spawn_tail, AgentLogEvent, TailConfig};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Args)]
pub struct TailArgs {
    /// The agent's working directory (default: current dir)
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Only consider session logs newer than now
    #[arg(long)]
    fresh: bool,
}

pub async fn run(args: TailArgs) -> Result<()> {
    let work_dir = match args.dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let since_epoch_ms = if args.fresh {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    } else {
        0
    };

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        ctrl_c_cancel.cancel();
    });

    let mut events = spawn_tail(
        TailConfig {
            work_dir,
            logs_root: None,
            since_epoch_ms,
        },
        cancel,
    );

    while let Some(event) = events.recv().await {
        match event {
            AgentLogEvent::Text { text } => println!("text: {}", text),
            AgentLogEvent::Thinking { text } => println!("thinking: {}", first_line(&text)),
            AgentLogEvent::ToolUse { name, input } => {
                println!("tool_use: {} {}", name, compact(&input))
            }
            AgentLogEvent::ToolResult { content } => {
                println!("tool_result: {}", first_line(&content))
            }
            AgentLogEvent::Usage {
                input_tokens,
                output_tokens,
                cache_read_input_tokens,
                cache_creation_input_tokens,
            } => println!(
                "usage: in={} out={} cache_read={} cache_create={}",
                input_tokens, output_tokens, cache_read_input_tokens, cache_creation_input_tokens
            ),
        }
    }
    Ok(())
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

fn compact(value: &serde_json::Value) -> String {
    let text = value.to_string();
    if text.len() > 120 {
        format!("{}...", &text[..117])
    } else {
        text
    }
}
