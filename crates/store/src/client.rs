// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed client for the versioned SQL store (Dolt's MySQL-compatible
//! wire protocol).
//!
//! One connection pool per `{database, purpose}` so a slow GC can never
//! starve reads. Every operation takes a caller-supplied deadline; the
//! client itself never retries.

use crate::compact::CompactionStore;
use crate::error::StoreError;
use async_trait::async_trait;
use parking_lot::Mutex;
use sqlx::mysql::{MySqlArguments, MySqlConnectOptions, MySqlConnection, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{Connection, MySql, Row};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Schemas that belong to the server, not to any rig.
const INTERNAL_SCHEMAS: &[&str] = &["information_schema", "mysql", "performance_schema", "sys"];

/// Tables Dolt manages internally; excluded from row-count integrity.
const INTERNAL_TABLE_PREFIX: &str = "dolt_";

/// Connection parameters and per-class timeouts for the store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub gc_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            gc_timeout: Duration::from_secs(300),
        }
    }
}

impl StoreConfig {
    fn connect_options(&self, db: Option<&str>) -> MySqlConnectOptions {
        let mut opts = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password);
        if let Some(db) = db {
            opts = opts.database(db);
        }
        opts
    }

    /// Deadline for a read-class operation starting now.
    pub fn read_deadline(&self) -> Instant {
        Instant::now() + self.read_timeout
    }

    /// Deadline for a write-class operation starting now.
    pub fn write_deadline(&self) -> Instant {
        Instant::now() + self.write_timeout
    }

    /// Deadline for a GC-class operation starting now.
    pub fn gc_deadline(&self) -> Instant {
        Instant::now() + self.gc_timeout
    }
}

/// Pool class a connection is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolPurpose {
    Read,
    Write,
    Gc,
}

/// Pooled store client. Cheap to clone; pools are created lazily and
/// shared across clones.
#[derive(Clone)]
pub struct StoreClient {
    config: StoreConfig,
    pools: Arc<Mutex<HashMap<(String, PoolPurpose), MySqlPool>>>,
}

impl StoreClient {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            pools: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn pool(&self, db: Option<&str>, purpose: PoolPurpose) -> MySqlPool {
        let key = (db.unwrap_or("").to_string(), purpose);
        let mut pools = self.pools.lock();
        pools
            .entry(key)
            .or_insert_with(|| {
                MySqlPoolOptions::new()
                    .max_connections(4)
                    .acquire_timeout(self.config.connect_timeout)
                    .connect_lazy_with(self.config.connect_options(db))
            })
            .clone()
    }

    async fn run<T, F>(&self, operation: &str, deadline: Instant, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        let budget = deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout_at(deadline, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(StoreError::from_query(operation, err)),
            Err(_) => Err(StoreError::Timeout {
                operation: operation.to_string(),
                after: budget,
            }),
        }
    }

    /// Total commit count on the current branch of `db`.
    pub async fn count_commits(&self, db: &str, deadline: Instant) -> Result<u64, StoreError> {
        let pool = self.pool(Some(db), PoolPurpose::Read);
        let count: i64 = self
            .run("count_commits", deadline, async {
                sqlx::query("SELECT COUNT(*) FROM dolt_log")
                    .fetch_one(&pool)
                    .await?
                    .try_get(0)
            })
            .await?;
        Ok(count.max(0) as u64)
    }

    /// Hash of the earliest commit in `db`'s history.
    pub async fn root_commit(&self, db: &str, deadline: Instant) -> Result<String, StoreError> {
        let pool = self.pool(Some(db), PoolPurpose::Read);
        self.run("root_commit", deadline, async {
            sqlx::query("SELECT commit_hash FROM dolt_log ORDER BY date ASC, commit_hash ASC LIMIT 1")
                .fetch_one(&pool)
                .await?
                .try_get(0)
        })
        .await
    }

    /// Hash a branch head resolves to.
    pub async fn head(&self, db: &str, branch: &str, deadline: Instant) -> Result<String, StoreError> {
        self.hashof(db, branch, deadline).await
    }

    /// `DOLT_HASHOF(ref)` for any ref.
    pub async fn hashof(&self, db: &str, reference: &str, deadline: Instant) -> Result<String, StoreError> {
        let pool = self.pool(Some(db), PoolPurpose::Read);
        self.run("hashof", deadline, async {
            sqlx::query("SELECT DOLT_HASHOF(?)")
                .bind(reference)
                .fetch_one(&pool)
                .await?
                .try_get(0)
        })
        .await
    }

    /// Row counts of every user table in `db` (internal `dolt_` tables
    /// excluded).
    pub async fn row_counts(&self, db: &str, deadline: Instant) -> Result<BTreeMap<String, u64>, StoreError> {
        let pool = self.pool(Some(db), PoolPurpose::Read);
        let rows = self
            .run("row_counts", deadline, async {
                sqlx::query("SHOW TABLES").fetch_all(&pool).await
            })
            .await?;
        let mut counts = BTreeMap::new();
        for row in rows {
            let table: String = row
                .try_get(0)
                .map_err(|e| StoreError::from_query("row_counts", e))?;
            if table.starts_with(INTERNAL_TABLE_PREFIX) {
                continue;
            }
            let count: i64 = self
                .run("row_counts", deadline, async {
                    sqlx::query(&format!("SELECT COUNT(*) FROM `{}`", table))
                        .fetch_one(&pool)
                        .await?
                        .try_get(0)
                })
                .await?;
            counts.insert(table, count.max(0) as u64);
        }
        Ok(counts)
    }

    /// User databases the server hosts (internal schemas excluded).
    pub async fn databases(&self, deadline: Instant) -> Result<Vec<String>, StoreError> {
        let pool = self.pool(None, PoolPurpose::Read);
        let rows = self
            .run("databases", deadline, async {
                sqlx::query("SHOW DATABASES").fetch_all(&pool).await
            })
            .await?;
        let mut names = Vec::new();
        for row in rows {
            let name: String = row
                .try_get(0)
                .map_err(|e| StoreError::from_query("databases", e))?;
            if !INTERNAL_SCHEMAS.contains(&name.as_str()) {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// `SELECT 1` round-trip time.
    pub async fn latency(&self, deadline: Instant) -> Result<Duration, StoreError> {
        let pool = self.pool(None, PoolPurpose::Read);
        let start = Instant::now();
        self.run("latency", deadline, async {
            sqlx::query("SELECT 1").fetch_one(&pool).await.map(|_| ())
        })
        .await?;
        Ok(start.elapsed())
    }

    /// Run garbage collection on `db`. Uses the GC pool and timeout class.
    pub async fn gc(&self, db: &str) -> Result<(), StoreError> {
        let pool = self.pool(Some(db), PoolPurpose::Gc);
        self.run("dolt_gc", self.config.gc_deadline(), async {
            sqlx::query("CALL DOLT_GC()").execute(&pool).await.map(|_| ())
        })
        .await
    }

    /// Drop storage for databases that were deleted.
    pub async fn purge_dropped_databases(&self, deadline: Instant) -> Result<(), StoreError> {
        let pool = self.pool(None, PoolPurpose::Gc);
        self.run("purge_dropped_databases", deadline, async {
            sqlx::query("CALL DOLT_PURGE_DROPPED_DATABASES()")
                .execute(&pool)
                .await
                .map(|_| ())
        })
        .await
    }

    /// Push `db` to its configured backup remote.
    pub async fn backup_sync(&self, db: &str, target: &str, deadline: Instant) -> Result<(), StoreError> {
        let pool = self.pool(Some(db), PoolPurpose::Write);
        self.run("backup_sync", deadline, async {
            sqlx::query("CALL DOLT_BACKUP('sync', ?)")
                .bind(target)
                .execute(&pool)
                .await
                .map(|_| ())
        })
        .await
    }

    /// Names of `db`'s configured backup remotes (empty when none).
    pub async fn backup_targets(&self, db: &str, deadline: Instant) -> Result<Vec<String>, StoreError> {
        let pool = self.pool(Some(db), PoolPurpose::Read);
        let rows = self
            .run("backup_targets", deadline, async {
                sqlx::query("SELECT name FROM dolt_backups").fetch_all(&pool).await
            })
            .await?;
        let mut names = Vec::new();
        for row in rows {
            names.push(
                row.try_get::<String, _>(0)
                    .map_err(|e| StoreError::from_query("backup_targets", e))?,
            );
        }
        Ok(names)
    }

    /// Create a branch in `db` (used for polecat isolation branches).
    pub async fn create_branch(&self, db: &str, name: &str, deadline: Instant) -> Result<(), StoreError> {
        let pool = self.pool(Some(db), PoolPurpose::Write);
        self.run("create_branch", deadline, async {
            sqlx::query("CALL DOLT_BRANCH(?)")
                .bind(name)
                .execute(&pool)
                .await
                .map(|_| ())
        })
        .await
    }

    /// Delete a branch in `db`.
    pub async fn delete_branch(&self, db: &str, name: &str, deadline: Instant) -> Result<(), StoreError> {
        let pool = self.pool(Some(db), PoolPurpose::Write);
        self.run("delete_branch", deadline, async {
            sqlx::query("CALL DOLT_BRANCH('-D', ?)")
                .bind(name)
                .execute(&pool)
                .await
                .map(|_| ())
        })
        .await
    }

    /// Open a dedicated single-connection session bound to `db`.
    ///
    /// Compaction must run all of its statements on one connection so
    /// `USE db` and the in-progress rebase survive between calls; the
    /// whole session shares one deadline.
    pub async fn session(&self, db: &str, deadline: Instant) -> Result<StoreSession, StoreError> {
        let opts = self.config.connect_options(Some(db));
        let connect = MySqlConnection::connect_with(&opts);
        let conn = match tokio::time::timeout(self.config.connect_timeout, connect).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(err)) => return Err(StoreError::from_query("session_connect", err)),
            Err(_) => {
                return Err(StoreError::Timeout {
                    operation: "session_connect".to_string(),
                    after: self.config.connect_timeout,
                })
            }
        };
        Ok(StoreSession {
            conn,
            deadline,
            db: db.to_string(),
        })
    }
}

/// A single dedicated connection with one deadline for the whole
/// statement sequence.
pub struct StoreSession {
    conn: MySqlConnection,
    deadline: Instant,
    db: String,
}

impl StoreSession {
    pub fn database(&self) -> &str {
        &self.db
    }

    fn budget(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    async fn call(
        &mut self,
        operation: &str,
        query: Query<'_, MySql, MySqlArguments>,
    ) -> Result<u64, StoreError> {
        let budget = self.budget();
        match tokio::time::timeout_at(self.deadline, query.execute(&mut self.conn)).await {
            Ok(Ok(result)) => Ok(result.rows_affected()),
            Ok(Err(err)) => Err(StoreError::from_query(operation, err)),
            Err(_) => Err(StoreError::Timeout {
                operation: operation.to_string(),
                after: budget,
            }),
        }
    }

    async fn fetch_all(&mut self, operation: &str, sql: &str) -> Result<Vec<MySqlRow>, StoreError> {
        let budget = self.budget();
        match tokio::time::timeout_at(self.deadline, sqlx::query(sql).fetch_all(&mut self.conn)).await {
            Ok(Ok(rows)) => Ok(rows),
            Ok(Err(err)) => Err(StoreError::from_query(operation, err)),
            Err(_) => Err(StoreError::Timeout {
                operation: operation.to_string(),
                after: budget,
            }),
        }
    }

    async fn fetch_one(&mut self, operation: &str, sql: &str) -> Result<MySqlRow, StoreError> {
        let budget = self.budget();
        match tokio::time::timeout_at(self.deadline, sqlx::query(sql).fetch_one(&mut self.conn)).await {
            Ok(Ok(row)) => Ok(row),
            Ok(Err(err)) => Err(StoreError::from_query(operation, err)),
            Err(_) => Err(StoreError::Timeout {
                operation: operation.to_string(),
                after: budget,
            }),
        }
    }
}

#[async_trait]
impl CompactionStore for StoreSession {
    async fn row_counts(&mut self) -> Result<BTreeMap<String, u64>, StoreError> {
        let rows = self.fetch_all("row_counts", "SHOW TABLES").await?;
        let mut tables = Vec::new();
        for row in &rows {
            let name: String = row
                .try_get(0)
                .map_err(|e| StoreError::from_query("row_counts", e))?;
            if !name.starts_with(INTERNAL_TABLE_PREFIX) {
                tables.push(name);
            }
        }
        let mut counts = BTreeMap::new();
        for table in tables {
            let row = self
                .fetch_one("row_counts", &format!("SELECT COUNT(*) FROM `{}`", table))
                .await?;
            let count: i64 = row
                .try_get(0)
                .map_err(|e| StoreError::from_query("row_counts", e))?;
            counts.insert(table, count.max(0) as u64);
        }
        Ok(counts)
    }

    async fn count_commits(&mut self) -> Result<u64, StoreError> {
        let row = self
            .fetch_one("count_commits", "SELECT COUNT(*) FROM dolt_log")
            .await?;
        let count: i64 = row
            .try_get(0)
            .map_err(|e| StoreError::from_query("count_commits", e))?;
        Ok(count.max(0) as u64)
    }

    async fn root_commit(&mut self) -> Result<String, StoreError> {
        let row = self
            .fetch_one(
                "root_commit",
                "SELECT commit_hash FROM dolt_log ORDER BY date ASC, commit_hash ASC LIMIT 1",
            )
            .await?;
        row.try_get(0)
            .map_err(|e| StoreError::from_query("root_commit", e))
    }

    async fn head(&mut self, branch: &str) -> Result<String, StoreError> {
        // Branch names come from our own constants, never user input.
        let sql = format!("SELECT DOLT_HASHOF('{}')", branch.replace('\'', ""));
        let row = self.fetch_one("head", &sql).await?;
        row.try_get(0).map_err(|e| StoreError::from_query("head", e))
    }

    async fn reset_soft(&mut self, hash: &str) -> Result<(), StoreError> {
        let q = sqlx::query("CALL DOLT_RESET('--soft', ?)").bind(hash.to_string());
        self.call("reset_soft", q).await.map(|_| ())
    }

    async fn commit_all(&mut self, message: &str) -> Result<(), StoreError> {
        let q = sqlx::query("CALL DOLT_COMMIT('-Am', ?)").bind(message.to_string());
        self.call("commit_all", q).await.map(|_| ())
    }

    async fn create_branch(&mut self, name: &str, from: &str) -> Result<(), StoreError> {
        let q = sqlx::query("CALL DOLT_BRANCH(?, ?)")
            .bind(name.to_string())
            .bind(from.to_string());
        self.call("create_branch", q).await.map(|_| ())
    }

    async fn delete_branch(&mut self, name: &str) -> Result<(), StoreError> {
        let q = sqlx::query("CALL DOLT_BRANCH('-D', ?)").bind(name.to_string());
        self.call("delete_branch", q).await.map(|_| ())
    }

    async fn rename_branch(&mut self, from: &str, to: &str) -> Result<(), StoreError> {
        let q = sqlx::query("CALL DOLT_BRANCH('-m', ?, ?)")
            .bind(from.to_string())
            .bind(to.to_string());
        self.call("rename_branch", q).await.map(|_| ())
    }

    async fn checkout(&mut self, name: &str) -> Result<(), StoreError> {
        let q = sqlx::query("CALL DOLT_CHECKOUT(?)").bind(name.to_string());
        self.call("checkout", q).await.map(|_| ())
    }

    async fn branches(&mut self) -> Result<Vec<String>, StoreError> {
        let rows = self
            .fetch_all("branches", "SELECT name FROM dolt_branches")
            .await?;
        let mut names = Vec::new();
        for row in &rows {
            names.push(
                row.try_get::<String, _>(0)
                    .map_err(|e| StoreError::from_query("branches", e))?,
            );
        }
        Ok(names)
    }

    async fn rebase_interactive(&mut self, base: &str) -> Result<(), StoreError> {
        let q = sqlx::query("CALL DOLT_REBASE('--interactive', ?)").bind(base.to_string());
        self.call("rebase_interactive", q).await.map(|_| ())
    }

    async fn rebase_plan_bounds(&mut self) -> Result<Option<(u64, u64)>, StoreError> {
        let row = self
            .fetch_one(
                "rebase_plan_bounds",
                "SELECT MIN(rebase_order), MAX(rebase_order) FROM dolt_rebase",
            )
            .await?;
        let min: Option<i64> = row
            .try_get(0)
            .map_err(|e| StoreError::from_query("rebase_plan_bounds", e))?;
        let max: Option<i64> = row
            .try_get(1)
            .map_err(|e| StoreError::from_query("rebase_plan_bounds", e))?;
        Ok(match (min, max) {
            (Some(min), Some(max)) => Some((min.max(0) as u64, max.max(0) as u64)),
            _ => None,
        })
    }

    async fn squash_plan_range(&mut self, above: u64, upto: u64) -> Result<u64, StoreError> {
        let q = sqlx::query(
            "UPDATE dolt_rebase SET action = 'squash' WHERE rebase_order > ? AND rebase_order <= ?",
        )
        .bind(above as i64)
        .bind(upto as i64);
        self.call("squash_plan_range", q).await
    }

    async fn rebase_continue(&mut self) -> Result<(), StoreError> {
        let q = sqlx::query("CALL DOLT_REBASE('--continue')");
        self.call("rebase_continue", q).await.map(|_| ())
    }

    async fn rebase_abort(&mut self) -> Result<(), StoreError> {
        let q = sqlx::query("CALL DOLT_REBASE('--abort')");
        self.call("rebase_abort", q).await.map(|_| ())
    }
}
