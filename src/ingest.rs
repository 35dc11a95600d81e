// src/ingest.rs
//! Live and demo ingests: one snapshot per run, one row per active job

use anyhow::Result;
use chrono::Utc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::core::{ConfigManager, Database, IngestConfig};
use crate::simpro::{
    auth, extract_job_fields, find_highest_job_id, is_active_project, JobProbe, JobSource,
    SimproClient,
};
use crate::types::{IngestReport, JobRecord, Snapshot};

/// Budget used when a demo load has nothing to clone and falls back to a live run
pub const DEMO_FALLBACK_SECONDS: u64 = 10;
const MIN_DISCOVERY: Duration = Duration::from_secs(3);

#[derive(Debug, Default)]
pub struct WalkOutcome {
    pub jobs: Vec<JobRecord>,
    pub tried: usize,
    /// Last id looked at
    pub stopped_at: i64,
    pub budget_exhausted: bool,
}

/// Walk ids downward from `high_id`, keeping active project jobs, until id 1,
/// the budget runs out, or enough jobs are in hand late in the budget
pub async fn collect_active_jobs<S>(
    source: &S,
    high_id: i64,
    started: Instant,
    ingest: &IngestConfig,
) -> WalkOutcome
where
    S: JobSource + ?Sized,
{
    let budget = ingest.budget();
    let deadline = started + budget;
    let enough_after = started + budget.mul_f64(ingest.enough_fraction);

    let mut outcome = WalkOutcome {
        stopped_at: high_id,
        ..Default::default()
    };
    let mut job_id = high_id;

    while Instant::now() < deadline && job_id >= 1 {
        outcome.tried += 1;
        outcome.stopped_at = job_id;

        match source.fetch_job(job_id).await {
            JobProbe::Found(payload) => {
                let mut record = extract_job_fields(&payload);
                if record.job_id == 0 {
                    record.job_id = job_id;
                }
                if is_active_project(&record) {
                    outcome.jobs.push(record);
                }
            }
            JobProbe::Unreachable => debug!("Job {} unreachable, skipping", job_id),
            JobProbe::Rejected(status) => debug!("Job {} rejected with {}", job_id, status),
            JobProbe::Missing => {}
        }

        if outcome.jobs.len() >= ingest.enough_jobs && Instant::now() > enough_after {
            break;
        }
        job_id -= 1;
    }

    outcome.budget_exhausted = Instant::now() >= deadline;
    if outcome.budget_exhausted {
        warn!("Time budget reached; stopping at id={}", outcome.stopped_at);
    }
    outcome
}

/// Discover, walk, and store one snapshot from any job source
pub async fn snapshot_from_source<S>(
    db: &Database,
    source: &S,
    ingest: &IngestConfig,
    started: Instant,
) -> Result<(IngestReport, Option<String>)>
where
    S: JobSource + ?Sized,
{
    let snapshots = db.snapshots();
    // Read before the new (still empty) snapshot becomes the newest one
    let last_seen = snapshots.last_seen_job_id().await?;
    let snapshot = snapshots.insert_snapshot(Utc::now()).await?;

    let discovery_budget =
        MIN_DISCOVERY.max(ingest.budget().mul_f64(ingest.discovery_fraction));
    let high_id = match find_highest_job_id(source, last_seen, started + discovery_budget).await {
        Some(id) => id,
        None => {
            warn!("Could not discover highest job id within time budget");
            last_seen.unwrap_or(ingest.fallback_high_id as i64)
        }
    };

    let mut walk = collect_active_jobs(source, high_id, started, ingest).await;

    let baseline = snapshots.baseline_before(snapshot.snapshot_date).await?;
    for job in walk.jobs.iter_mut() {
        job.apply_baseline(baseline.get(&job.job_id));
    }

    let inserted = snapshots.insert_jobs(snapshot.id, &walk.jobs).await?;

    db.set_meta("last_snapshot_id", &snapshot.id.to_string())
        .await?;
    if let Some(max_id) = walk.jobs.iter().map(|job| job.job_id).max() {
        db.set_meta("last_seen_job_id", &max_id.to_string()).await?;
    }

    let elapsed = started.elapsed().as_secs_f64();
    info!(
        "Live ingest finished in {:.2}s (jobs={}, tried={}, snapshot_id={})",
        elapsed, inserted, walk.tried, snapshot.id
    );

    let note = if walk.budget_exhausted {
        Some(format!("time budget reached at id {}", walk.stopped_at))
    } else {
        None
    };

    Ok((
        IngestReport {
            ok: true,
            jobs: inserted,
            tried: walk.tried,
            snapshot_id: snapshot.id,
            elapsed_sec: (elapsed * 1000.0).round() / 1000.0,
            cloned_from: None,
            error: None,
        },
        note,
    ))
}

pub async fn ingest_live(config: &ConfigManager, db: &Database) -> Result<IngestReport> {
    ingest_live_with_budget(config, db, config.ingest.budget_seconds).await
}

/// Authenticate, probe the API and store a snapshot within `budget_seconds`
pub async fn ingest_live_with_budget(
    config: &ConfigManager,
    db: &Database,
    budget_seconds: u64,
) -> Result<IngestReport> {
    let creds = config.simpro.require()?;
    let ingest = config.ingest.clone().with_budget(budget_seconds);
    let run_id = db.runs().start_run("live").await?;

    info!(
        "Starting live ingest (budget={}s, company_id={})",
        ingest.budget_seconds, creds.company_id
    );

    let result: Result<(IngestReport, Option<String>)> = async {
        let token = auth::fetch_token(&creds).await?;
        auth::cache_token(&config.environment.token_cache_path, &token).await;

        let mut client = SimproClient::new(&creds, &token)?;
        client.resolve_api_prefix().await;

        // The budget covers discovery and the walk only
        let started = Instant::now();

        snapshot_from_source(db, &client, &ingest, started).await
    }
    .await;

    match result {
        Ok((report, note)) => {
            db.runs()
                .finish_run(run_id, true, report.tried, report.jobs, note.as_deref())
                .await?;
            Ok(report)
        }
        Err(e) => {
            error!("Live ingest failed: {:#}", e);
            if let Err(record_err) = db
                .runs()
                .finish_run(run_id, false, 0, 0, Some(&format!("{:#}", e)))
                .await
            {
                error!("Failed to record ingest failure: {}", record_err);
            }
            Err(e)
        }
    }
}

/// Clone the newest snapshot so the dashboard has something to show.
/// With nothing to clone, try a short live run; if that fails too, an empty
/// snapshot is still created and the report carries the error.
pub async fn ingest_demo(config: &ConfigManager, db: &Database) -> Result<IngestReport> {
    let started = Instant::now();
    let snapshots = db.snapshots();

    let Some(latest) = snapshots.latest_snapshot().await? else {
        info!("No snapshot to clone; trying a short live ingest");
        return match ingest_live_with_budget(config, db, DEMO_FALLBACK_SECONDS).await {
            Ok(report) => Ok(report),
            Err(e) => {
                warn!("Demo fallback live ingest failed: {}", e);
                let snapshot = snapshots.insert_snapshot(Utc::now()).await?;
                Ok(IngestReport {
                    ok: false,
                    jobs: 0,
                    tried: 0,
                    snapshot_id: snapshot.id,
                    elapsed_sec: started.elapsed().as_secs_f64(),
                    cloned_from: None,
                    error: Some(e.to_string()),
                })
            }
        };
    };

    let run_id = db.runs().start_run("demo").await?;
    let cloned: Result<(Snapshot, u64)> = async {
        let (snapshot, copied) = snapshots.clone_snapshot(latest.id, Utc::now()).await?;
        db.set_meta("last_snapshot_id", &snapshot.id.to_string())
            .await?;
        Ok((snapshot, copied))
    }
    .await;

    let (snapshot, copied) = match cloned {
        Ok(cloned) => cloned,
        Err(e) => {
            error!("Demo load failed: {:#}", e);
            if let Err(record_err) = db
                .runs()
                .finish_run(run_id, false, 0, 0, Some(&format!("{:#}", e)))
                .await
            {
                error!("Failed to record ingest failure: {}", record_err);
            }
            return Err(e);
        }
    };
    let note = format!("cloned from snapshot {}", latest.id);
    db.runs()
        .finish_run(run_id, true, 0, copied as usize, Some(&note))
        .await?;

    info!("Demo snapshot {} {}", snapshot.id, note);
    Ok(IngestReport {
        ok: true,
        jobs: copied as usize,
        tried: 0,
        snapshot_id: snapshot.id,
        elapsed_sec: started.elapsed().as_secs_f64(),
        cloned_from: Some(latest.id),
        error: None,
    })
}
