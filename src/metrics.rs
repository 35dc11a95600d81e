// src/metrics.rs
//! End-of-day summary over one snapshot

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::core::Database;
use crate::types::{JobHistoryPoint, JobRecord, Snapshot};

const TOP_N: usize = 5;
const BURN_RISK: f64 = 0.80;
const GM_RISK: f64 = 0.20;
const IDLE_DAYS: i64 = 3;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Totals {
    pub job_count: usize,
    pub hours_today: f64,
    pub cost_today: f64,
    pub estimated_revenue: f64,
    pub estimated_cost: f64,
    pub actual_cost_to_date: f64,
    pub estimated_hours: f64,
    pub actual_hours: f64,
    pub cost_to_complete: f64,
    pub gm_to_date_pct: Option<f64>,
    pub burn_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdleJob {
    #[serde(flatten)]
    pub job: JobRecord,
    pub idle_days: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub totals: Totals,
    pub top_cost_today: Vec<JobRecord>,
    pub at_risk: Vec<JobRecord>,
    pub exceptions: Vec<IdleJob>,
    pub jobs: Vec<JobRecord>,
}

/// Summary of the latest snapshot as served by the dashboard
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotSummary {
    pub snapshot: Snapshot,
    #[serde(flatten)]
    pub summary: Summary,
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}

pub fn compute_totals(rows: &[JobRecord]) -> Totals {
    let mut totals = rows.iter().fold(Totals::default(), |mut acc, row| {
        acc.hours_today += row.hours_today;
        acc.cost_today += row.cost_today;
        acc.estimated_revenue += row.estimated_revenue;
        acc.estimated_cost += row.estimated_cost;
        acc.actual_cost_to_date += row.actual_cost_to_date;
        acc.estimated_hours += row.estimated_hours;
        acc.actual_hours += row.actual_hours;
        acc.cost_to_complete += row.cost_to_complete.unwrap_or(0.0);
        acc
    });

    totals.job_count = rows.len();
    totals.gm_to_date_pct = ratio(
        totals.estimated_revenue - totals.actual_cost_to_date,
        totals.estimated_revenue,
    );
    totals.burn_pct = ratio(totals.actual_cost_to_date, totals.estimated_cost);
    totals
}

pub fn is_at_risk(job: &JobRecord) -> bool {
    let burn = job.burn_pct.unwrap_or(0.0);
    let margin_low = job.gm_actual_pct.map(|gm| gm < GM_RISK).unwrap_or(false);
    burn >= BURN_RISK || margin_low
}

/// Days since the earliest snapshot in the current unbroken run of identical
/// cost and hours. `points` must be in snapshot order.
pub fn idle_days(job: &JobRecord, points: &[&JobHistoryPoint], today: NaiveDate) -> i64 {
    let since = points
        .iter()
        .rev()
        .take_while(|p| {
            p.actual_cost_to_date == job.actual_cost_to_date && p.actual_hours == job.actual_hours
        })
        .last()
        .map(|p| p.snapshot_date);

    match since {
        Some(date) => (today - date).num_days().max(0),
        None => 0,
    }
}

pub fn compute_summary(rows: Vec<JobRecord>, history: &[JobHistoryPoint], today: NaiveDate) -> Summary {
    let totals = compute_totals(&rows);

    let mut top_cost_today = rows.clone();
    top_cost_today.sort_by(|a, b| b.cost_today.total_cmp(&a.cost_today));
    top_cost_today.truncate(TOP_N);

    let mut at_risk: Vec<JobRecord> = rows.iter().filter(|j| is_at_risk(j)).cloned().collect();
    at_risk.sort_by(|a, b| {
        b.burn_pct
            .unwrap_or(0.0)
            .total_cmp(&a.burn_pct.unwrap_or(0.0))
    });
    at_risk.truncate(TOP_N);

    let mut by_job: HashMap<i64, Vec<&JobHistoryPoint>> = HashMap::new();
    for point in history {
        by_job.entry(point.job_id).or_default().push(point);
    }

    let exceptions = rows
        .iter()
        .filter_map(|job| {
            let points = by_job.get(&job.job_id)?;
            let days = idle_days(job, points, today);
            (days >= IDLE_DAYS).then(|| IdleJob {
                job: job.clone(),
                idle_days: days,
            })
        })
        .collect();

    Summary {
        totals,
        top_cost_today,
        at_risk,
        exceptions,
        jobs: rows,
    }
}

async fn summarize_as_of(
    db: &Database,
    snapshot: Snapshot,
    today: NaiveDate,
) -> Result<SnapshotSummary> {
    let snapshots = db.snapshots();
    let rows = snapshots.snapshot_rows(snapshot.id).await?;
    let history = snapshots.job_history(snapshot.id).await?;
    let summary = compute_summary(rows, &history, today);
    Ok(SnapshotSummary { snapshot, summary })
}

/// Summary of a stored snapshot as it stood on its own day
pub async fn summarize_snapshot(db: &Database, snapshot: Snapshot) -> Result<SnapshotSummary> {
    let day = snapshot.snapshot_date;
    summarize_as_of(db, snapshot, day).await
}

/// Newest snapshot, with idle days counted up to today. `None` until the
/// first snapshot exists.
pub async fn latest_summary(db: &Database) -> Result<Option<SnapshotSummary>> {
    match db.snapshots().latest_snapshot().await? {
        Some(snapshot) => Ok(Some(
            summarize_as_of(db, snapshot, Utc::now().date_naive()).await?,
        )),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::database::tests::temp_db_path;

    fn job(id: i64, cost_today: f64, burn: Option<f64>, gm: Option<f64>) -> JobRecord {
        JobRecord {
            job_id: id,
            job_name: format!("Job {}", id),
            cost_today,
            burn_pct: burn,
            gm_actual_pct: gm,
            estimated_revenue: 1000.0,
            estimated_cost: 800.0,
            actual_cost_to_date: 400.0,
            actual_hours: 10.0,
            ..Default::default()
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn point(job_id: i64, date: NaiveDate, cost: f64, hours: f64) -> JobHistoryPoint {
        JobHistoryPoint {
            job_id,
            snapshot_date: date,
            actual_cost_to_date: cost,
            actual_hours: hours,
        }
    }

    #[test]
    fn test_totals_and_portfolio_ratios() {
        let rows = vec![job(1, 50.0, None, None), job(2, 25.0, None, None)];
        let totals = compute_totals(&rows);
        assert_eq!(totals.job_count, 2);
        assert_eq!(totals.cost_today, 75.0);
        assert_eq!(totals.estimated_revenue, 2000.0);
        assert_eq!(totals.gm_to_date_pct, Some(0.6));
        assert_eq!(totals.burn_pct, Some(0.5));
    }

    #[test]
    fn test_totals_without_revenue_have_no_ratios() {
        let totals = compute_totals(&[JobRecord::default()]);
        assert_eq!(totals.gm_to_date_pct, None);
        assert_eq!(totals.burn_pct, None);
        assert_eq!(compute_totals(&[]).job_count, 0);
    }

    #[test]
    fn test_top_cost_today_keeps_five_highest() {
        let rows: Vec<JobRecord> = (1..=7).map(|i| job(i, i as f64 * 10.0, None, None)).collect();
        let summary = compute_summary(rows, &[], day(10));
        let ids: Vec<i64> = summary.top_cost_today.iter().map(|j| j.job_id).collect();
        assert_eq!(ids, vec![7, 6, 5, 4, 3]);
        assert_eq!(summary.jobs.len(), 7);
    }

    #[test]
    fn test_at_risk_rules() {
        assert!(is_at_risk(&job(1, 0.0, Some(0.8), Some(0.5))));
        assert!(is_at_risk(&job(2, 0.0, Some(0.1), Some(0.19))));
        assert!(!is_at_risk(&job(3, 0.0, None, None)));
        assert!(!is_at_risk(&job(4, 0.0, Some(0.79), Some(0.2))));
        // a margin of exactly zero is a real figure, not a missing one
        assert!(is_at_risk(&job(5, 0.0, None, Some(0.0))));
        assert!(is_at_risk(&job(6, 0.0, Some(0.1), Some(0.0))));

        let rows = vec![
            job(1, 0.0, Some(0.9), None),
            job(2, 0.0, Some(1.4), None),
            job(3, 0.0, None, Some(0.05)),
            job(4, 0.0, Some(0.2), Some(0.6)),
        ];
        let summary = compute_summary(rows, &[], day(10));
        let ids: Vec<i64> = summary.at_risk.iter().map(|j| j.job_id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn test_idle_days_counts_from_first_unchanged_snapshot() {
        let current = job(9, 0.0, None, None);
        let history = vec![
            point(9, day(1), 100.0, 2.0),
            point(9, day(3), 400.0, 10.0),
            point(9, day(5), 400.0, 10.0),
            point(9, day(6), 400.0, 10.0),
        ];
        let refs: Vec<&JobHistoryPoint> = history.iter().collect();
        assert_eq!(idle_days(&current, &refs, day(7)), 4);
        assert_eq!(idle_days(&current, &[], day(7)), 0);
    }

    #[test]
    fn test_exceptions_need_three_idle_days() {
        let rows = vec![job(1, 0.0, None, None), job(2, 0.0, None, None)];
        let history = vec![
            point(1, day(1), 400.0, 10.0),
            point(1, day(4), 400.0, 10.0),
            point(2, day(3), 390.0, 9.0),
            point(2, day(4), 400.0, 10.0),
        ];
        let summary = compute_summary(rows, &history, day(4));
        assert_eq!(summary.exceptions.len(), 1);
        assert_eq!(summary.exceptions[0].job.job_id, 1);
        assert_eq!(summary.exceptions[0].idle_days, 3);
    }

    #[tokio::test]
    async fn test_latest_summary_reads_newest_snapshot() {
        let db = Database::new(&temp_db_path("metrics")).await.unwrap();
        assert!(latest_summary(&db).await.unwrap().is_none());

        let snapshot = db.snapshots().insert_snapshot(Utc::now()).await.unwrap();
        db.snapshots()
            .insert_jobs(snapshot.id, &[job(5, 12.5, Some(0.5), Some(0.6))])
            .await
            .unwrap();

        let latest = latest_summary(&db).await.unwrap().unwrap();
        assert_eq!(latest.snapshot.id, snapshot.id);
        assert_eq!(latest.summary.totals.job_count, 1);
        assert_eq!(latest.summary.totals.cost_today, 12.5);
        assert!(latest.summary.exceptions.is_empty());
    }

    #[tokio::test]
    async fn test_older_snapshot_counts_idle_days_to_its_own_date() {
        use chrono::TimeZone;

        let db = Database::new(&temp_db_path("metrics_history")).await.unwrap();
        let snapshots = db.snapshots();
        let at = |d: u32| Utc.with_ymd_and_hms(2026, 1, d, 17, 0, 0).unwrap();
        let costed = |cost: f64| JobRecord {
            actual_cost_to_date: cost,
            ..job(287, 0.0, None, None)
        };

        let first = snapshots.insert_snapshot(at(1)).await.unwrap();
        snapshots.insert_jobs(first.id, &[costed(100.0)]).await.unwrap();
        let changed = snapshots.insert_snapshot(at(5)).await.unwrap();
        snapshots.insert_jobs(changed.id, &[costed(200.0)]).await.unwrap();
        let later = snapshots.insert_snapshot(at(9)).await.unwrap();
        snapshots.insert_jobs(later.id, &[costed(200.0)]).await.unwrap();

        let on_change = summarize_snapshot(&db, changed).await.unwrap();
        assert!(on_change.summary.exceptions.is_empty());

        let after = summarize_snapshot(&db, later).await.unwrap();
        assert_eq!(after.summary.exceptions.len(), 1);
        assert_eq!(after.summary.exceptions[0].idle_days, 4);
    }
}
