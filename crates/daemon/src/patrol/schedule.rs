// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduled maintenance: a time-of-day window rather than a fixed
//! interval. The patrol ticks frequently; the window decides whether a
//! tick actually fires, and the refire setting gates repeats.

use super::{Patrol, PatrolError};
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveTime, TimeZone};
use gt_adapters::BeadsAdapter;
use gt_engine::MoleculeTracker;
use gt_store::{maintain, MaintainOptions, StoreOps, WispPurge};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How often the window may refire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refire {
    Daily,
    Weekly,
    Monthly,
    Every(Duration),
}

impl Refire {
    /// Parse "daily" | "weekly" | "monthly" | a duration string.
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Refire::Daily),
            "weekly" => Ok(Refire::Weekly),
            "monthly" => Ok(Refire::Monthly),
            other => gt_core::parse_duration(other).map(Refire::Every),
        }
    }

    /// Minimum gap between firings. Slightly under the nominal period so
    /// tick jitter cannot skip a whole window.
    fn min_gap(&self) -> chrono::Duration {
        match self {
            Refire::Daily => chrono::Duration::hours(23),
            Refire::Weekly => chrono::Duration::days(6) + chrono::Duration::hours(23),
            Refire::Monthly => chrono::Duration::days(27),
            Refire::Every(d) => {
                chrono::Duration::from_std(*d).unwrap_or_else(|_| chrono::Duration::hours(23))
            }
        }
    }
}

/// Decides whether a tick at `now` should trigger the maintenance body.
#[derive(Debug, Clone)]
pub struct MaintenanceWindow {
    at: NaiveTime,
    refire: Refire,
    last_fired: Option<DateTime<Local>>,
}

impl MaintenanceWindow {
    /// `at` is "HH:MM".
    pub fn new(at: &str, refire: Refire) -> Result<Self, String> {
        let at = NaiveTime::parse_from_str(at, "%H:%M")
            .map_err(|e| format!("invalid time-of-day {:?}: {}", at, e))?;
        Ok(Self {
            at,
            refire,
            last_fired: None,
        })
    }

    /// True when `now` is past today's window and the window has not
    /// fired for this period yet. Records the firing.
    pub fn should_fire(&mut self, now: DateTime<Local>) -> bool {
        let due = match Local.from_local_datetime(&now.date_naive().and_time(self.at)) {
            chrono::LocalResult::Single(due) => due,
            chrono::LocalResult::Ambiguous(earliest, _) => earliest,
            chrono::LocalResult::None => return false,
        };
        if now < due {
            return false;
        }
        if let Some(last) = self.last_fired {
            // Already fired for this window
            if last >= due {
                return false;
            }
            if now - last < self.refire.min_gap() {
                return false;
            }
        }
        self.last_fired = Some(now);
        true
    }
}

/// The scheduled-maintenance patrol body: the maintain pipeline run
/// non-interactively inside the window.
pub struct ScheduledMaintenancePatrol<S: StoreOps, P: WispPurge, B: BeadsAdapter> {
    store: S,
    purger: P,
    tracker: MoleculeTracker<B>,
    window: Mutex<MaintenanceWindow>,
    options: MaintainOptions,
}

impl<S: StoreOps, P: WispPurge, B: BeadsAdapter> ScheduledMaintenancePatrol<S, P, B> {
    pub fn new(
        store: S,
        purger: P,
        tracker: MoleculeTracker<B>,
        window: MaintenanceWindow,
        options: MaintainOptions,
    ) -> Self {
        Self {
            store,
            purger,
            tracker,
            window: Mutex::new(window),
            options,
        }
    }
}

#[async_trait]
impl<S, P, B> Patrol for ScheduledMaintenancePatrol<S, P, B>
where
    S: StoreOps + 'static,
    P: WispPurge + 'static,
    B: BeadsAdapter,
{
    fn name(&self) -> &'static str {
        gt_core::PATROL_SCHEDULED_MAINTENANCE
    }

    async fn run(&self, _cancel: &CancellationToken) -> Result<(), PatrolError> {
        if !self.window.lock().should_fire(Local::now()) {
            return Ok(());
        }
        tracing::info!(patrol = self.name(), "maintenance window open");

        let molecule = self.tracker.pour("scheduled-maintenance", &BTreeMap::new()).await;

        let plan = maintain::plan(&self.store, &self.options)
            .await
            .map_err(PatrolError::Store)?;
        molecule.close_step("scan").await;

        let report = maintain::run(&self.store, &self.purger, &plan, &self.options).await;
        molecule.close_step("clean").await;

        tracing::info!(
            patrol = self.name(),
            reaped = report.total_reaped(),
            flattened = report.total_flattened(),
            errors = report.had_errors(),
            "maintenance complete"
        );
        molecule.close().await;
        Ok(())
    }
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
