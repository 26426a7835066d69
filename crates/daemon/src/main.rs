// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gas Town Daemon (gtd)
//!
//! Background process that runs the patrol catalog over the versioned
//! store: reaping, compaction, health checks, backups, and scheduled
//! maintenance.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use gt_adapters::{BdCli, TmuxAdapter};
use gt_core::{parse_duration, CompactionMode, DaemonConfig, Role};
use gt_daemon::env;
use gt_daemon::lifecycle::{self, Config, LifecycleError};
use gt_daemon::patrol::backup::{DoltBackupPatrol, JsonlBackupPatrol};
use gt_daemon::patrol::compactor::{CompactorPatrol, DEFAULT_KEEP_RECENT};
use gt_daemon::patrol::doctor::{Doctor, DoctorConfig, DoctorPatrol};
use gt_daemon::patrol::reaper::{ReaperPatrol, DEFAULT_DELETE_AGE};
use gt_daemon::patrol::role::RolePatrol;
use gt_daemon::patrol::schedule::{MaintenanceWindow, Refire, ScheduledMaintenancePatrol};
use gt_daemon::patrol::{BeadsPurger, Patrol, PatrolScheduler};
use gt_engine::MoleculeTracker;
use gt_store::{MaintainOptions, StoreClient};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle info flags before any config/lock acquisition
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("gtd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("gtd {}", env!("CARGO_PKG_VERSION"));
                println!("Gas Town Daemon - patrols the versioned store");
                println!();
                println!("USAGE:");
                println!("    gtd");
                println!();
                println!("The daemon is typically started by the `gt` CLI and should not");
                println!("be invoked directly. Patrols are configured in");
                println!("<town-root>/mayor/daemon.json.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: gtd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = Config::load()?;

    // Rotate log file if it has grown too large
    lifecycle::rotate_log_if_needed(&config.log_path);

    // Write startup marker to log (before tracing setup, so CLI can find it)
    write_startup_marker(&config)?;

    let _log_guard = setup_logging(&config)?;

    // Single instance per town
    let _lock = match lifecycle::acquire_lock(&config) {
        Ok(lock) => lock,
        Err(LifecycleError::LockFailed(_)) => {
            eprintln!("gtd is already running");
            if let Some(pid) = lifecycle::lock_holder_pid(&config) {
                eprintln!("  pid: {pid}");
            }
            std::process::exit(1);
        }
        Err(e) => {
            error!("failed to start daemon: {}", e);
            return Err(e.into());
        }
    };

    info!(town = %config.town_root.display(), "starting gtd");

    // Patrol configuration: seed lifecycle defaults at first boot,
    // never overwriting user values.
    let mut patrol_config = DaemonConfig::load(&config.town_root)?;
    if patrol_config.ensure_lifecycle_defaults() {
        patrol_config.save(&config.town_root)?;
        info!("lifecycle patrol defaults written");
    }

    let cancel = CancellationToken::new();
    let patrols = build_catalog(&config, &patrol_config);
    if patrols.is_empty() {
        info!("no patrols enabled");
    }
    let scheduler = PatrolScheduler::start(patrols, cancel.clone());

    info!("gtd ready");
    println!("READY");

    // Graceful shutdown on SIGTERM/SIGINT
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    cancel.cancel();
    scheduler.shutdown().await;
    info!("gtd stopped");
    Ok(())
}

/// Assemble the enabled patrol catalog from config.
fn build_catalog(
    config: &Config,
    patrol_config: &DaemonConfig,
) -> Vec<(Arc<dyn Patrol>, Duration)> {
    let store = StoreClient::new(env::store_config());
    let beads = BdCli::new(&config.town_root);
    let tracker = MoleculeTracker::new(beads.clone());
    let sessions = TmuxAdapter::new();

    let mut patrols: Vec<(Arc<dyn Patrol>, Duration)> = Vec::new();

    let interval_of = |name: &str, fallback: Duration| -> Duration {
        patrol_config
            .patrol(name)
            .interval
            .as_deref()
            .and_then(|s| parse_duration(s).ok())
            .unwrap_or(fallback)
    };

    if patrol_config.is_enabled(gt_core::PATROL_REAPER) {
        let settings = patrol_config.patrol(gt_core::PATROL_REAPER);
        let delete_age = settings
            .delete_age
            .as_deref()
            .and_then(|s| parse_duration(s).ok())
            .unwrap_or(DEFAULT_DELETE_AGE);
        patrols.push((
            Arc::new(ReaperPatrol::new(
                store.clone(),
                beads.clone(),
                tracker.clone(),
                settings.databases.clone(),
                delete_age,
            )),
            interval_of(gt_core::PATROL_REAPER, Duration::from_secs(30 * 60)),
        ));
    }

    if patrol_config.is_enabled(gt_core::PATROL_COMPACTOR) {
        let settings = patrol_config.patrol(gt_core::PATROL_COMPACTOR);
        patrols.push((
            Arc::new(CompactorPatrol::new(
                store.clone(),
                tracker.clone(),
                settings.databases.clone(),
                settings.commit_threshold.unwrap_or(500),
                settings.mode.unwrap_or(CompactionMode::Flatten),
                settings.keep_recent.unwrap_or(DEFAULT_KEEP_RECENT),
            )),
            interval_of(gt_core::PATROL_COMPACTOR, Duration::from_secs(24 * 3600)),
        ));
    }

    if patrol_config.is_enabled(gt_core::PATROL_DOCTOR) {
        let settings = patrol_config.patrol(gt_core::PATROL_DOCTOR);
        let store_config = env::store_config();
        let mut doctor_config =
            DoctorConfig::new(&config.town_root, &store_config.host, store_config.port);
        doctor_config.apply_settings(&settings);
        patrols.push((
            Arc::new(DoctorPatrol::new(
                Doctor::new(store.clone(), doctor_config),
                config.town_root.clone(),
                tracker.clone(),
            )),
            interval_of(gt_core::PATROL_DOCTOR, Duration::from_secs(5 * 60)),
        ));
    }

    if patrol_config.is_enabled(gt_core::PATROL_JSONL_BACKUP) {
        patrols.push((
            Arc::new(JsonlBackupPatrol::new(
                config.town_root.join("jsonl-mirror"),
                tracker.clone(),
            )),
            interval_of(gt_core::PATROL_JSONL_BACKUP, Duration::from_secs(15 * 60)),
        ));
    }

    if patrol_config.is_enabled(gt_core::PATROL_DOLT_BACKUP) {
        let settings = patrol_config.patrol(gt_core::PATROL_DOLT_BACKUP);
        patrols.push((
            Arc::new(DoltBackupPatrol::new(
                store.clone(),
                tracker.clone(),
                settings.databases.clone(),
            )),
            interval_of(gt_core::PATROL_DOLT_BACKUP, Duration::from_secs(15 * 60)),
        ));
    }

    if patrol_config.is_enabled(gt_core::PATROL_SCHEDULED_MAINTENANCE) {
        let settings = patrol_config.patrol(gt_core::PATROL_SCHEDULED_MAINTENANCE);
        let at = settings.at.as_deref().unwrap_or("03:00");
        let refire = settings
            .interval
            .as_deref()
            .and_then(|s| Refire::parse(s).ok())
            .unwrap_or(Refire::Daily);
        match MaintenanceWindow::new(at, refire) {
            Ok(window) => {
                let options = MaintainOptions {
                    commit_threshold: settings.commit_threshold.unwrap_or(1000),
                    ..Default::default()
                };
                patrols.push((
                    Arc::new(ScheduledMaintenancePatrol::new(
                        store.clone(),
                        BeadsPurger(beads.clone()),
                        tracker.clone(),
                        window,
                        options,
                    )),
                    Duration::from_secs(env::maintenance_tick_secs()),
                ));
            }
            Err(e) => {
                error!(error = %e, "scheduled maintenance misconfigured, skipping");
            }
        }
    }

    for role in [Role::Deacon, Role::Refinery, Role::Witness] {
        let name = match role {
            Role::Deacon => gt_core::PATROL_DEACON,
            Role::Refinery => gt_core::PATROL_REFINERY,
            _ => gt_core::PATROL_WITNESS,
        };
        if patrol_config.is_enabled(name) {
            patrols.push((
                Arc::new(RolePatrol::new(
                    role,
                    discover_rigs(&config.town_root),
                    sessions.clone(),
                )),
                interval_of(name, Duration::from_secs(5 * 60)),
            ));
        }
    }

    patrols
}

/// Rig names are the directories under `<town-root>/rigs`.
fn discover_rigs(town_root: &std::path::Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(town_root.join("rigs")) else {
        return Vec::new();
    };
    let mut rigs: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    rigs.sort();
    rigs
}

/// Startup marker prefix written to log before anything else.
const STARTUP_MARKER_PREFIX: &str = "--- gtd: starting (pid: ";

/// Write startup marker to log file (appends to existing log)
fn write_startup_marker(config: &Config) -> Result<(), LifecycleError> {
    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)?;
    writeln!(file, "{}{}) ---\n", STARTUP_MARKER_PREFIX, std::process::id())?;
    Ok(())
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let parent = config
        .log_path
        .parent()
        .ok_or_else(|| LifecycleError::Config("log path has no parent".to_string()))?;
    std::fs::create_dir_all(parent)?;
    let file_name = config
        .log_path
        .file_name()
        .ok_or_else(|| LifecycleError::Config("log path has no file name".to_string()))?;

    // Rotation happens at startup via rotate_log_if_needed
    let file_appender = tracing_appender::rolling::never(parent, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
