// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The patrol scheduler and its fixed catalog.
//!
//! One task per enabled patrol: sleep the interval, and if the previous
//! body is still running, drop the tick. Bodies run in their own tasks
//! and never propagate errors out of the scheduler; a process-wide
//! cancellation token drains everything at shutdown.

pub mod backup;
pub mod compactor;
pub mod doctor;
pub mod reaper;
pub mod role;
pub mod schedule;

use async_trait::async_trait;
use gt_adapters::BeadsAdapter;
use gt_store::WispPurge;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Errors a patrol body can report. They end the cycle; the scheduler
/// logs them and keeps ticking.
#[derive(Debug, Error)]
pub enum PatrolError {
    #[error(transparent)]
    Store(#[from] gt_store::StoreError),
    #[error(transparent)]
    Compaction(#[from] gt_store::CompactionError),
    #[error(transparent)]
    Beads(#[from] gt_adapters::BeadsError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

/// A named periodic task.
#[async_trait]
pub trait Patrol: Send + Sync + 'static {
    fn name(&self) -> &'static str;
    async fn run(&self, cancel: &CancellationToken) -> Result<(), PatrolError>;
}

/// Runs the catalog. Dropping ticks under overlap is the single-flight
/// guarantee: at most one body of each patrol runs per process.
pub struct PatrolScheduler {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl PatrolScheduler {
    /// Start one ticker task per patrol.
    pub fn start(
        patrols: Vec<(Arc<dyn Patrol>, Duration)>,
        cancel: CancellationToken,
    ) -> Self {
        let mut handles = Vec::new();
        for (patrol, interval) in patrols {
            tracing::info!(patrol = patrol.name(), ?interval, "patrol scheduled");
            handles.push(tokio::spawn(patrol_loop(patrol, interval, cancel.clone())));
        }
        Self { cancel, handles }
    }

    /// Cancel and wait for the ticker tasks. In-flight bodies observe the
    /// token at their next suspension point.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

async fn patrol_loop(patrol: Arc<dyn Patrol>, interval: Duration, cancel: CancellationToken) {
    let in_flight = Arc::new(AtomicBool::new(false));
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
        if cancel.is_cancelled() {
            break;
        }
        if in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!(patrol = patrol.name(), "previous body still running, tick dropped");
            continue;
        }

        let patrol = Arc::clone(&patrol);
        let flag = Arc::clone(&in_flight);
        let body_cancel = cancel.clone();
        tokio::spawn(async move {
            let name = patrol.name();
            let started = std::time::Instant::now();
            match patrol.run(&body_cancel).await {
                Ok(()) => {
                    tracing::debug!(patrol = name, elapsed_ms = started.elapsed().as_millis() as u64, "patrol body complete");
                }
                Err(e) => {
                    tracing::warn!(patrol = name, error = %e, "patrol body failed");
                }
            }
            flag.store(false, Ordering::SeqCst);
        });
    }
    tracing::debug!(patrol = patrol.name(), "patrol ticker stopped");
}

/// Adapts the issue layer to the maintain pipeline's purge seam.
#[derive(Clone)]
pub struct BeadsPurger<B: BeadsAdapter>(pub B);

#[async_trait]
impl<B: BeadsAdapter> WispPurge for BeadsPurger<B> {
    async fn purge_closed(
        &self,
        db: &str,
        older_than: Duration,
        dry_run: bool,
    ) -> Result<u64, String> {
        self.0
            .purge_closed_wisps(db, older_than, dry_run)
            .await
            .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
