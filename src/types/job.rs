// src/types/job.rs
//! Rows stored per snapshot and the records around them

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ===== Job rows =====

/// One active job as stored in a snapshot. Amounts the payload did not carry
/// are stored as 0; ratios that cannot be computed stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobRecord {
    pub job_id: i64,
    pub job_code: String,
    pub job_name: String,
    pub client_name: String,
    pub stage: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub job_type: String,
    pub estimated_revenue: f64,
    pub estimated_cost: f64,
    pub actual_cost_to_date: f64,
    pub estimated_hours: f64,
    pub actual_hours: f64,
    pub hours_today: f64,
    pub cost_today: f64,
    pub gm_estimated_pct: Option<f64>,
    pub gm_actual_pct: Option<f64>,
    pub cost_to_complete: Option<f64>,
    pub burn_pct: Option<f64>,
}

impl JobRecord {
    /// Apply today's movement against the last snapshot from a previous day
    pub fn apply_baseline(&mut self, baseline: Option<&JobBaseline>) {
        match baseline {
            Some(base) => {
                self.hours_today = (self.actual_hours - base.actual_hours).max(0.0);
                self.cost_today = (self.actual_cost_to_date - base.actual_cost_to_date).max(0.0);
            }
            None => {
                self.hours_today = 0.0;
                self.cost_today = 0.0;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, sqlx::FromRow)]
pub struct JobBaseline {
    pub job_id: i64,
    pub actual_cost_to_date: f64,
    pub actual_hours: f64,
}

/// A job's cost and hours as seen by one snapshot
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct JobHistoryPoint {
    pub job_id: i64,
    pub snapshot_date: NaiveDate,
    pub actual_cost_to_date: f64,
    pub actual_hours: f64,
}

// ===== Snapshots and runs =====

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Snapshot {
    pub id: i64,
    pub as_of: DateTime<Utc>,
    pub snapshot_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SnapshotListing {
    pub id: i64,
    pub as_of: DateTime<Utc>,
    pub snapshot_date: NaiveDate,
    pub job_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct IngestRun {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub ok: bool,
    pub mode: String,
    pub jobs_tried: i64,
    pub jobs_inserted: i64,
    pub note: Option<String>,
}
