// src/web/handlers.rs
//! Route bodies; the route attributes live in `web/mod.rs`

use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::response::Redirect;
use rocket::serde::json::Json;
use rocket::State;
use serde_json::json;
use tracing::{error, info, warn};

use crate::core::Database;
use crate::ingest::{ingest_demo, ingest_live};
use crate::metrics::{latest_summary, summarize_snapshot, SnapshotSummary};
use crate::types::{ErrorBody, IngestReport, IngestRun, JobRecord, SnapshotListing};
use crate::web::types::{HealthResponse, IngestResponse, ServerState};
use crate::web::views::render_index_page;

const RECENT_RUNS: i64 = 10;
const SNAPSHOT_LISTING: i64 = 50;

type ApiError = Custom<Json<ErrorBody>>;

fn internal(e: anyhow::Error) -> ApiError {
    error!("Request failed: {:#}", e);
    Custom(Status::InternalServerError, Json(ErrorBody::new(e.to_string())))
}

fn not_found(message: &str) -> ApiError {
    Custom(Status::NotFound, Json(ErrorBody::new(message)))
}

pub async fn index_handler(state: &State<ServerState>) -> String {
    let runs: Option<Vec<IngestRun>> = match state.db.runs().recent_runs(RECENT_RUNS).await {
        Ok(runs) => Some(runs),
        Err(e) => {
            warn!("Could not read ingest history: {}", e);
            None
        }
    };
    let latest = match latest_summary(&state.db).await {
        Ok(latest) => latest,
        Err(e) => {
            warn!("Could not build summary: {}", e);
            None
        }
    };

    render_index_page(latest.as_ref(), runs.as_deref())
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

fn ingest_response(mode: &str, result: anyhow::Result<IngestReport>) -> IngestResponse {
    match result {
        Ok(report) if report.ok => {
            info!(
                "{} ingest stored snapshot {} ({} jobs)",
                mode, report.snapshot_id, report.jobs
            );
            IngestResponse::Done(Redirect::to("/"))
        }
        Ok(report) => {
            warn!("{} ingest finished without data: {:?}", mode, report.error);
            let body = serde_json::to_value(&report)
                .unwrap_or_else(|e| json!({ "ok": false, "error": e.to_string() }));
            IngestResponse::Failed(Custom(Status::InternalServerError, Json(body)))
        }
        Err(e) => {
            error!("{} ingest failed: {:#}", mode, e);
            IngestResponse::Failed(Custom(
                Status::InternalServerError,
                Json(json!({ "ok": false, "error": e.to_string() })),
            ))
        }
    }
}

pub async fn ingest_live_handler(state: &State<ServerState>) -> IngestResponse {
    ingest_response("Live", ingest_live(&state.config, &state.db).await)
}

pub async fn ingest_demo_handler(state: &State<ServerState>) -> IngestResponse {
    ingest_response("Demo", ingest_demo(&state.config, &state.db).await)
}

pub async fn summary_handler(state: &State<ServerState>) -> Result<Json<SnapshotSummary>, ApiError> {
    match latest_summary(&state.db).await.map_err(internal)? {
        Some(latest) => Ok(Json(latest)),
        None => Err(not_found("No snapshot yet")),
    }
}

pub async fn snapshots_handler(
    state: &State<ServerState>,
) -> Result<Json<Vec<SnapshotListing>>, ApiError> {
    let listing = state
        .db
        .snapshots()
        .list_snapshots(SNAPSHOT_LISTING)
        .await
        .map_err(internal)?;
    Ok(Json(listing))
}

pub async fn snapshot_rows_handler(
    id: i64,
    db: &Database,
) -> Result<Json<Vec<JobRecord>>, ApiError> {
    let snapshots = db.snapshots();
    if snapshots.get_snapshot(id).await.map_err(internal)?.is_none() {
        return Err(not_found(&format!("Snapshot {} not found", id)));
    }
    let rows = snapshots.snapshot_rows(id).await.map_err(internal)?;
    Ok(Json(rows))
}

pub async fn snapshot_summary_handler(
    id: i64,
    db: &Database,
) -> Result<Json<SnapshotSummary>, ApiError> {
    match db.snapshots().get_snapshot(id).await.map_err(internal)? {
        Some(snapshot) => Ok(Json(summarize_snapshot(db, snapshot).await.map_err(internal)?)),
        None => Err(not_found(&format!("Snapshot {} not found", id))),
    }
}
