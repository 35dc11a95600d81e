// src/core/database.rs
//! SQLite storage for snapshots, job rows, ingest runs and key/value meta

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use crate::core::FsOps;
use crate::types::{
    IngestRun, JobBaseline, JobHistoryPoint, JobRecord, Snapshot, SnapshotListing,
};

const JOB_COLUMNS: &str = "job_id, job_code, job_name, client_name, stage, type, \
     estimated_revenue, estimated_cost, actual_cost_to_date, \
     estimated_hours, actual_hours, hours_today, cost_today, \
     gm_estimated_pct, gm_actual_pct, cost_to_complete, burn_pct";

// ===== Core Database Connection Management =====

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database file and run migrations
    pub async fn new(database_path: &Path) -> Result<Self> {
        if let Some(parent) = database_path.parent() {
            FsOps::ensure_dir_exists(parent).await?;
        }

        let database_url = format!("sqlite:{}?mode=rwc", database_path.display());
        let pool = SqlitePool::connect(&database_url).await.with_context(|| {
            format!("Failed to connect to database: {}", database_path.display())
        })?;

        info!("Database connection established: {}", database_path.display());

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS snapshot (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                as_of TEXT NOT NULL,
                snapshot_date TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS job (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                snapshot_id INTEGER NOT NULL REFERENCES snapshot(id),
                job_id INTEGER NOT NULL,
                job_code TEXT NOT NULL DEFAULT '',
                job_name TEXT NOT NULL DEFAULT '',
                client_name TEXT NOT NULL DEFAULT '',
                stage TEXT NOT NULL DEFAULT '',
                type TEXT NOT NULL DEFAULT '',
                estimated_revenue REAL NOT NULL DEFAULT 0,
                estimated_cost REAL NOT NULL DEFAULT 0,
                actual_cost_to_date REAL NOT NULL DEFAULT 0,
                estimated_hours REAL NOT NULL DEFAULT 0,
                actual_hours REAL NOT NULL DEFAULT 0,
                hours_today REAL NOT NULL DEFAULT 0,
                cost_today REAL NOT NULL DEFAULT 0,
                gm_estimated_pct REAL,
                gm_actual_pct REAL,
                cost_to_complete REAL,
                burn_pct REAL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS meta (
                k TEXT PRIMARY KEY,
                v TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ingest_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                started_at TEXT NOT NULL,
                ended_at TEXT,
                ok BOOLEAN NOT NULL DEFAULT FALSE,
                mode TEXT NOT NULL,
                jobs_tried INTEGER NOT NULL DEFAULT 0,
                jobs_inserted INTEGER NOT NULL DEFAULT 0,
                note TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_job_snapshot ON job(snapshot_id);")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_job_job_id ON job(job_id);")
            .execute(&self.pool)
            .await?;

        info!("Database migrations completed");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Database health check failed")?;
        Ok(())
    }

    pub async fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query("INSERT INTO meta(k, v) VALUES (?, ?) ON CONFLICT(k) DO UPDATE SET v = excluded.v")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to store meta key {}", key))?;
        Ok(())
    }

    pub async fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let value: Option<Option<String>> = sqlx::query_scalar("SELECT v FROM meta WHERE k = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value.flatten())
    }

    pub fn snapshots(&self) -> SnapshotRepository<'_> {
        SnapshotRepository::new(&self.pool)
    }

    pub fn runs(&self) -> IngestRunRepository<'_> {
        IngestRunRepository::new(&self.pool)
    }
}

// ===== Snapshot Repository =====

pub struct SnapshotRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SnapshotRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert_snapshot(&self, as_of: DateTime<Utc>) -> Result<Snapshot> {
        let snapshot_date = as_of.date_naive();
        let result = sqlx::query("INSERT INTO snapshot (as_of, snapshot_date) VALUES (?, ?)")
            .bind(as_of)
            .bind(snapshot_date)
            .execute(self.pool)
            .await
            .context("Failed to insert snapshot")?;

        Ok(Snapshot {
            id: result.last_insert_rowid(),
            as_of,
            snapshot_date,
        })
    }

    /// Insert all rows for a snapshot in one transaction
    pub async fn insert_jobs(&self, snapshot_id: i64, jobs: &[JobRecord]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "INSERT INTO job (snapshot_id, {}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            JOB_COLUMNS
        );

        for job in jobs {
            sqlx::query(&sql)
                .bind(snapshot_id)
                .bind(job.job_id)
                .bind(&job.job_code)
                .bind(&job.job_name)
                .bind(&job.client_name)
                .bind(&job.stage)
                .bind(&job.job_type)
                .bind(job.estimated_revenue)
                .bind(job.estimated_cost)
                .bind(job.actual_cost_to_date)
                .bind(job.estimated_hours)
                .bind(job.actual_hours)
                .bind(job.hours_today)
                .bind(job.cost_today)
                .bind(job.gm_estimated_pct)
                .bind(job.gm_actual_pct)
                .bind(job.cost_to_complete)
                .bind(job.burn_pct)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to insert job {}", job.job_id))?;
        }

        tx.commit().await?;
        debug!("Inserted {} job rows into snapshot {}", jobs.len(), snapshot_id);
        Ok(jobs.len())
    }

    /// Highest job id in the newest snapshot
    pub async fn last_seen_job_id(&self) -> Result<Option<i64>> {
        let max: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT MAX(job_id) FROM job
            WHERE snapshot_id = (SELECT MAX(id) FROM snapshot)
            "#,
        )
        .fetch_one(self.pool)
        .await?;
        Ok(max.filter(|id| *id > 0))
    }

    pub async fn latest_snapshot(&self) -> Result<Option<Snapshot>> {
        let snapshot = sqlx::query_as::<_, Snapshot>(
            "SELECT id, as_of, snapshot_date FROM snapshot ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(self.pool)
        .await?;
        Ok(snapshot)
    }

    pub async fn get_snapshot(&self, snapshot_id: i64) -> Result<Option<Snapshot>> {
        let snapshot = sqlx::query_as::<_, Snapshot>(
            "SELECT id, as_of, snapshot_date FROM snapshot WHERE id = ?",
        )
        .bind(snapshot_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(snapshot)
    }

    pub async fn list_snapshots(&self, limit: i64) -> Result<Vec<SnapshotListing>> {
        let listings = sqlx::query_as::<_, SnapshotListing>(
            r#"
            SELECT s.id, s.as_of, s.snapshot_date, COUNT(j.id) AS job_count
            FROM snapshot s
            LEFT JOIN job j ON j.snapshot_id = s.id
            GROUP BY s.id
            ORDER BY s.snapshot_date DESC, s.id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(listings)
    }

    pub async fn snapshot_rows(&self, snapshot_id: i64) -> Result<Vec<JobRecord>> {
        let sql = format!(
            "SELECT {} FROM job WHERE snapshot_id = ? ORDER BY job_name, job_id",
            JOB_COLUMNS
        );
        let rows = sqlx::query_as::<_, JobRecord>(&sql)
            .bind(snapshot_id)
            .fetch_all(self.pool)
            .await
            .with_context(|| format!("Failed to load rows for snapshot {}", snapshot_id))?;
        Ok(rows)
    }

    /// Copy every row of `from_snapshot` into a fresh snapshot
    pub async fn clone_snapshot(
        &self,
        from_snapshot: i64,
        as_of: DateTime<Utc>,
    ) -> Result<(Snapshot, u64)> {
        let snapshot_date = as_of.date_naive();
        let mut tx = self.pool.begin().await?;

        let new_id = sqlx::query("INSERT INTO snapshot (as_of, snapshot_date) VALUES (?, ?)")
            .bind(as_of)
            .bind(snapshot_date)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

        let sql = format!(
            "INSERT INTO job (snapshot_id, {cols}) SELECT ?, {cols} FROM job WHERE snapshot_id = ?",
            cols = JOB_COLUMNS
        );
        let copied = sqlx::query(&sql)
            .bind(new_id)
            .bind(from_snapshot)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to clone snapshot {}", from_snapshot))?
            .rows_affected();

        tx.commit().await?;

        Ok((
            Snapshot {
                id: new_id,
                as_of,
                snapshot_date,
            },
            copied,
        ))
    }

    /// Cost and hours per job from the newest snapshot dated before `date`
    pub async fn baseline_before(&self, date: NaiveDate) -> Result<HashMap<i64, JobBaseline>> {
        let rows = sqlx::query_as::<_, JobBaseline>(
            r#"
            SELECT job_id, actual_cost_to_date, actual_hours FROM job
            WHERE snapshot_id = (
                SELECT MAX(id) FROM snapshot WHERE snapshot_date < ?
            )
            "#,
        )
        .bind(date)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| (row.job_id, row)).collect())
    }

    /// Every observation, up to and including `snapshot_id`, of the jobs in that snapshot
    pub async fn job_history(&self, snapshot_id: i64) -> Result<Vec<JobHistoryPoint>> {
        let points = sqlx::query_as::<_, JobHistoryPoint>(
            r#"
            SELECT j.job_id, s.snapshot_date, j.actual_cost_to_date, j.actual_hours
            FROM job j
            JOIN snapshot s ON s.id = j.snapshot_id
            WHERE s.id <= ?
              AND j.job_id IN (SELECT job_id FROM job WHERE snapshot_id = ?)
            ORDER BY j.job_id, s.id
            "#,
        )
        .bind(snapshot_id)
        .bind(snapshot_id)
        .fetch_all(self.pool)
        .await?;
        Ok(points)
    }
}

// ===== Ingest Run Repository =====

pub struct IngestRunRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> IngestRunRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn start_run(&self, mode: &str) -> Result<i64> {
        let result = sqlx::query("INSERT INTO ingest_runs (started_at, mode) VALUES (?, ?)")
            .bind(Utc::now())
            .bind(mode)
            .execute(self.pool)
            .await
            .context("Failed to record ingest run")?;
        Ok(result.last_insert_rowid())
    }

    pub async fn finish_run(
        &self,
        run_id: i64,
        ok: bool,
        jobs_tried: usize,
        jobs_inserted: usize,
        note: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE ingest_runs
            SET ended_at = ?, ok = ?, jobs_tried = ?, jobs_inserted = ?, note = ?
            WHERE id = ?
            "#,
        )
        .bind(Utc::now())
        .bind(ok)
        .bind(jobs_tried as i64)
        .bind(jobs_inserted as i64)
        .bind(note)
        .bind(run_id)
        .execute(self.pool)
        .await
        .with_context(|| format!("Failed to finish ingest run {}", run_id))?;
        Ok(())
    }

    pub async fn recent_runs(&self, limit: i64) -> Result<Vec<IngestRun>> {
        let runs = sqlx::query_as::<_, IngestRun>(
            r#"
            SELECT id, started_at, ended_at, ok, mode, jobs_tried, jobs_inserted, note
            FROM ingest_runs
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(runs)
    }
}
