// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The doctor patrol: periodic read-only health checks over the store
//! and its surroundings, plus an advisory recommender.
//!
//! The doctor never acts. It writes a report; external agents decide.

use super::{Patrol, PatrolError};
use async_trait::async_trait;
use gt_adapters::{find_zombie_sql_servers, list_processes};
use gt_core::config::PatrolSettings;
use gt_store::StoreOps;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;

/// Report file name under the town root.
pub const REPORT_FILE: &str = ".doctor-dog-report.json";

/// TCP dial budget.
const TCP_TIMEOUT: Duration = Duration::from_secs(5);

/// Default advisory thresholds. Config overrides of zero or below keep
/// the defaults.
const DEFAULT_LATENCY_THRESHOLD_MS: u64 = 5000;
const DEFAULT_ORPHAN_THRESHOLD: u64 = 20;
const DEFAULT_BACKUP_AGE_SECS: u64 = 3600;

/// Doctor inputs and thresholds.
#[derive(Debug, Clone)]
pub struct DoctorConfig {
    pub host: String,
    pub port: u16,
    /// Filesystem backup directory whose newest file dates the backup.
    pub backup_dir: PathBuf,
    /// Git mirror of the JSONL export; its last commit dates that backup.
    pub jsonl_mirror: PathBuf,
    /// Root holding one storage directory per production database.
    pub db_storage_root: PathBuf,
    pub store_binary: String,
    /// Command-line flag a supervised sql-server carries; processes
    /// without it count as zombies.
    pub expected_port_flag: String,
    pub latency_threshold_ms: u64,
    pub orphan_threshold: u64,
    pub backup_age_secs: u64,
}

impl DoctorConfig {
    pub fn new(town_root: &Path, host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            backup_dir: town_root.join("backups"),
            jsonl_mirror: town_root.join("jsonl-mirror"),
            db_storage_root: town_root.join("dolt"),
            store_binary: "dolt".to_string(),
            expected_port_flag: format!("--port {}", port),
            latency_threshold_ms: DEFAULT_LATENCY_THRESHOLD_MS,
            orphan_threshold: DEFAULT_ORPHAN_THRESHOLD,
            backup_age_secs: DEFAULT_BACKUP_AGE_SECS,
        }
    }

    /// Apply user threshold overrides; non-positive values keep defaults.
    pub fn apply_settings(&mut self, settings: &PatrolSettings) {
        if let Some(ms) = settings.latency_threshold_ms.filter(|v| *v > 0) {
            self.latency_threshold_ms = ms;
        }
        if let Some(count) = settings.orphan_threshold.filter(|v| *v > 0) {
            self.orphan_threshold = count;
        }
        if let Some(secs) = settings.backup_age_secs.filter(|v| *v > 0) {
            self.backup_age_secs = secs;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LatencyCheck {
    pub ms: u64,
    #[serde(default)]
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabasesCheck {
    pub names: Vec<String>,
    pub count: usize,
    #[serde(default)]
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZombieProcess {
    pub pid: u32,
    pub command: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZombiesCheck {
    pub processes: Vec<ZombieProcess>,
    #[serde(default)]
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupAgeCheck {
    pub age_seconds: Option<u64>,
    pub missing: bool,
    #[serde(default)]
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiskUsageCheck {
    pub bytes_per_database: BTreeMap<String, u64>,
    #[serde(default)]
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: String,
    pub reason: String,
    pub severity: Severity,
}

/// The full health report, serialized pretty-printed to
/// [`REPORT_FILE`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub timestamp: String,
    pub tcp_reachable: bool,
    pub latency: LatencyCheck,
    pub databases: DatabasesCheck,
    pub zombies: ZombiesCheck,
    /// Filesystem backup directory age.
    pub backup_age: BackupAgeCheck,
    /// JSONL git mirror age (dated by its latest commit).
    pub jsonl_backup_age: BackupAgeCheck,
    pub disk_usage: DiskUsageCheck,
    pub recommendations: Vec<Recommendation>,
}

/// The recommender: pure function of check results and thresholds.
///
/// A value exactly at a threshold does not trigger; a check that failed
/// (non-empty error) never triggers, so probe failures cannot masquerade
/// as findings.
pub fn recommend(report: &HealthReport, config: &DoctorConfig) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    if !report.tcp_reachable {
        recommendations.push(Recommendation {
            action: "restart_server".to_string(),
            reason: format!("sql-server unreachable at {}:{}", config.host, config.port),
            severity: Severity::Critical,
        });
    }

    if report.latency.error.is_empty() && report.latency.ms > config.latency_threshold_ms {
        recommendations.push(Recommendation {
            action: "escalate_latency".to_string(),
            reason: format!(
                "SELECT 1 took {}ms (threshold {}ms)",
                report.latency.ms, config.latency_threshold_ms
            ),
            severity: Severity::High,
        });
    }

    if report.databases.error.is_empty()
        && report.databases.count as u64 > config.orphan_threshold
    {
        recommendations.push(Recommendation {
            action: "run_cleanup".to_string(),
            reason: format!(
                "{} databases on the server (threshold {})",
                report.databases.count, config.orphan_threshold
            ),
            severity: Severity::Warning,
        });
    }

    if report.backup_age.error.is_empty() && !report.backup_age.missing {
        if let Some(age) = report.backup_age.age_seconds {
            if age > config.backup_age_secs {
                recommendations.push(Recommendation {
                    action: "sync_backup".to_string(),
                    reason: format!(
                        "newest backup is {}s old (threshold {}s)",
                        age, config.backup_age_secs
                    ),
                    severity: Severity::Warning,
                });
            }
        }
    }

    recommendations
}

/// Write the report atomically: temp file, then rename.
pub fn write_report(town_root: &Path, report: &HealthReport) -> std::io::Result<PathBuf> {
    let path = town_root.join(REPORT_FILE);
    let text = serde_json::to_string_pretty(report)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::create_dir_all(town_root)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, text)?;
    std::fs::rename(&tmp, &path)?;
    Ok(path)
}

/// The doctor itself, generic over the store seam.
pub struct Doctor<S: StoreOps> {
    store: S,
    config: DoctorConfig,
}

impl<S: StoreOps> Doctor<S> {
    pub fn new(store: S, config: DoctorConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &DoctorConfig {
        &self.config
    }

    /// Run all six checks and the recommender. Each check records its
    /// own error; none aborts the run.
    pub async fn examine(&self) -> HealthReport {
        let mut report = HealthReport {
            timestamp: chrono::Utc::now().to_rfc3339(),
            tcp_reachable: self.check_tcp().await,
            latency: self.check_latency().await,
            databases: self.check_databases().await,
            zombies: self.check_zombies().await,
            backup_age: check_backup_dir(&self.config.backup_dir),
            jsonl_backup_age: check_jsonl_mirror(&self.config.jsonl_mirror).await,
            disk_usage: check_disk_usage(&self.config.db_storage_root),
            recommendations: Vec::new(),
        };
        report.recommendations = recommend(&report, &self.config);
        report
    }

    async fn check_tcp(&self) -> bool {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        matches!(
            tokio::time::timeout(TCP_TIMEOUT, tokio::net::TcpStream::connect(&addr)).await,
            Ok(Ok(_))
        )
    }

    async fn check_latency(&self) -> LatencyCheck {
        match self.store.latency().await {
            Ok(elapsed) => LatencyCheck {
                ms: elapsed.as_millis() as u64,
                error: String::new(),
            },
            Err(e) => LatencyCheck {
                ms: 0,
                error: e.to_string(),
            },
        }
    }

    async fn check_databases(&self) -> DatabasesCheck {
        match self.store.databases().await {
            Ok(names) => DatabasesCheck {
                count: names.len(),
                names,
                error: String::new(),
            },
            Err(e) => DatabasesCheck {
                names: Vec::new(),
                count: 0,
                error: e.to_string(),
            },
        }
    }

    async fn check_zombies(&self) -> ZombiesCheck {
        match list_processes().await {
            Ok(processes) => {
                let zombies = find_zombie_sql_servers(
                    &processes,
                    &self.config.store_binary,
                    &self.config.expected_port_flag,
                );
                ZombiesCheck {
                    processes: zombies
                        .into_iter()
                        .map(|p| ZombieProcess {
                            pid: p.pid,
                            command: p.command.clone(),
                        })
                        .collect(),
                    error: String::new(),
                }
            }
            Err(e) => ZombiesCheck {
                processes: Vec::new(),
                error: e,
            },
        }
    }
}

/// Age of the newest file under the backup directory.
fn check_backup_dir(dir: &Path) -> BackupAgeCheck {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return BackupAgeCheck {
                age_seconds: None,
                missing: true,
                error: String::new(),
            };
        }
        Err(e) => {
            return BackupAgeCheck {
                age_seconds: None,
                missing: false,
                error: e.to_string(),
            };
        }
    };

    let newest = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| e.metadata().ok().and_then(|m| m.modified().ok()))
        .max();
    match newest {
        Some(mtime) => BackupAgeCheck {
            age_seconds: Some(
                SystemTime::now()
                    .duration_since(mtime)
                    .unwrap_or(Duration::ZERO)
                    .as_secs(),
            ),
            missing: false,
            error: String::new(),
        },
        None => BackupAgeCheck {
            age_seconds: None,
            missing: true,
            error: String::new(),
        },
    }
}

/// Age of the JSONL mirror's latest commit.
async fn check_jsonl_mirror(mirror: &Path) -> BackupAgeCheck {
    if !mirror.exists() {
        return BackupAgeCheck {
            age_seconds: None,
            missing: true,
            error: String::new(),
        };
    }
    match gt_adapters::git::last_commit_age(mirror).await {
        Ok(Some(age)) => BackupAgeCheck {
            age_seconds: Some(age.as_secs()),
            missing: false,
            error: String::new(),
        },
        Ok(None) => BackupAgeCheck {
            age_seconds: None,
            missing: true,
            error: String::new(),
        },
        Err(e) => BackupAgeCheck {
            age_seconds: None,
            missing: false,
            error: e,
        },
    }
}

/// Sum file sizes per database storage directory.
fn check_disk_usage(storage_root: &Path) -> DiskUsageCheck {
    let entries = match std::fs::read_dir(storage_root) {
        Ok(entries) => entries,
        Err(e) => {
            return DiskUsageCheck {
                bytes_per_database: BTreeMap::new(),
                error: e.to_string(),
            };
        }
    };

    let mut per_db = BTreeMap::new();
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.is_dir() {
            let name = entry.file_name().to_string_lossy().into_owned();
            per_db.insert(name, dir_size(&path));
        }
    }
    DiskUsageCheck {
        bytes_per_database: per_db,
        error: String::new(),
    }
}

fn dir_size(dir: &Path) -> u64 {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(|e| e.ok())
        .map(|e| {
            let path = e.path();
            if path.is_dir() {
                dir_size(&path)
            } else {
                e.metadata().map(|m| m.len()).unwrap_or(0)
            }
        })
        .sum()
}

/// The patrol wrapper: examine, write the report, log the lifecycle.
pub struct DoctorPatrol<S: StoreOps + Clone + 'static, B: gt_adapters::BeadsAdapter> {
    doctor: Doctor<S>,
    town_root: PathBuf,
    tracker: gt_engine::MoleculeTracker<B>,
}

impl<S: StoreOps + Clone + 'static, B: gt_adapters::BeadsAdapter> DoctorPatrol<S, B> {
    pub fn new(doctor: Doctor<S>, town_root: PathBuf, tracker: gt_engine::MoleculeTracker<B>) -> Self {
        Self {
            doctor,
            town_root,
            tracker,
        }
    }
}

#[async_trait]
impl<S, B> Patrol for DoctorPatrol<S, B>
where
    S: StoreOps + Clone + 'static,
    B: gt_adapters::BeadsAdapter,
{
    fn name(&self) -> &'static str {
        gt_core::PATROL_DOCTOR
    }

    async fn run(&self, _cancel: &CancellationToken) -> Result<(), PatrolError> {
        let molecule = self.tracker.pour("doctor-dog", &BTreeMap::new()).await;

        let report = self.doctor.examine().await;
        molecule.close_step("probe").await;

        let path = write_report(&self.town_root, &report)?;
        molecule.close_step("report").await;

        if report.recommendations.is_empty() {
            tracing::info!(patrol = self.name(), report = %path.display(), "all checks clean");
        } else {
            for rec in &report.recommendations {
                tracing::warn!(
                    patrol = self.name(),
                    action = %rec.action,
                    severity = ?rec.severity,
                    reason = %rec.reason,
                    "advisory recommendation"
                );
            }
        }
        molecule.close().await;
        Ok(())
    }
}

#[cfg(test)]
#[path = "doctor_tests.rs"]
mod tests;
