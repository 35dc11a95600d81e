// src/simpro/discovery.rs
//! Locate the highest existing job id without a fixed id range.
//!
//! Exponential probing finds an upper bound, then a binary search narrows it
//! down to the last id that answers. Every loop checks `deadline`, so the
//! result is best effort when the API is slow.

use tokio::time::Instant;
use tracing::{debug, info};

use super::JobSource;

const MIN_START: i64 = 100;
const DEFAULT_START: i64 = 1000;
const MAX_PROBE: i64 = 5_000_000;

pub async fn find_highest_job_id<S>(
    source: &S,
    start_hint: Option<i64>,
    deadline: Instant,
) -> Option<i64>
where
    S: JobSource + ?Sized,
{
    let mut probe = start_hint.unwrap_or(DEFAULT_START).max(MIN_START);
    debug!("High-water search starting at {}", probe);

    if source.fetch_job(probe).await.is_missing() {
        // Walk down until something answers, halving the step on every 404
        let mut step = (probe / 10).max(1);
        let mut found = false;
        while Instant::now() < deadline && probe > 1 {
            probe = (probe - step).max(1);
            let outcome = source.fetch_job(probe).await;
            if outcome.exists() {
                found = true;
                break;
            }
            if outcome.is_missing() && step > 1 {
                step = (step / 2).max(1);
            }
        }
        if !found {
            info!("No existing job found below the starting id");
            return None;
        }
    } else {
        // Ramp up until a 404; any other failure keeps the current bound
        while Instant::now() < deadline && probe < MAX_PROBE {
            let next = probe * 2;
            if source.fetch_job(next).await.exists() {
                probe = next;
            } else {
                break;
            }
        }
    }

    let mut lo = probe.max(1);
    let mut hi = probe * 2;
    if source.fetch_job(hi).await.exists() {
        hi *= 2;
    }

    while Instant::now() < deadline && hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if source.fetch_job(mid).await.exists() {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    info!("Highest job id found: {}", lo);
    Some(lo)
}
