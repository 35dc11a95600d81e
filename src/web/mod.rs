// src/web/mod.rs

pub mod handlers;
pub mod types;
pub mod views;

pub use types::*;

use anyhow::Result;
use rocket::fs::FileServer;
use rocket::http::Status;
use rocket::response::content::RawHtml;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{catchers, get, post, routes, Build, Request, Rocket, State};
use tracing::{error, info};

use crate::core::{ConfigManager, Database};
use crate::metrics::SnapshotSummary;
use crate::types::{ErrorBody, JobRecord, SnapshotListing};

#[get("/")]
pub async fn index(state: &State<ServerState>) -> RawHtml<String> {
    RawHtml(handlers::index_handler(state).await)
}

#[get("/health")]
pub async fn health() -> Json<HealthResponse> {
    handlers::health_handler().await
}

#[post("/ingest/live")]
pub async fn ingest_live(state: &State<ServerState>) -> IngestResponse {
    handlers::ingest_live_handler(state).await
}

#[post("/ingest/demo")]
pub async fn ingest_demo(state: &State<ServerState>) -> IngestResponse {
    handlers::ingest_demo_handler(state).await
}

#[get("/api/summary")]
pub async fn summary(
    state: &State<ServerState>,
) -> Result<Json<SnapshotSummary>, Custom<Json<ErrorBody>>> {
    handlers::summary_handler(state).await
}

#[get("/api/snapshots")]
pub async fn snapshots(
    state: &State<ServerState>,
) -> Result<Json<Vec<SnapshotListing>>, Custom<Json<ErrorBody>>> {
    handlers::snapshots_handler(state).await
}

#[get("/api/snapshots/<id>")]
pub async fn snapshot_rows(
    id: i64,
    state: &State<ServerState>,
) -> Result<Json<Vec<JobRecord>>, Custom<Json<ErrorBody>>> {
    handlers::snapshot_rows_handler(id, &state.db).await
}

#[get("/api/snapshots/<id>/summary")]
pub async fn snapshot_summary(
    id: i64,
    state: &State<ServerState>,
) -> Result<Json<SnapshotSummary>, Custom<Json<ErrorBody>>> {
    handlers::snapshot_summary_handler(id, &state.db).await
}

#[get("/favicon.ico")]
pub fn favicon() -> Status {
    Status::NoContent
}

// Error catchers
#[rocket::catch(404)]
pub fn not_found(request: &Request<'_>) -> Json<ErrorBody> {
    Json(ErrorBody::new(format!("No route for {}", request.uri())))
}

#[rocket::catch(500)]
pub fn internal_error() -> Json<ErrorBody> {
    Json(ErrorBody::new("Internal server error"))
}

/// Assemble the server without launching it
pub fn build_rocket(config: ConfigManager, db: Database) -> Rocket<Build> {
    let static_path = config.environment.static_path.clone();

    let mut rocket = rocket::build()
        .manage(ServerState { config, db })
        .register("/", catchers![not_found, internal_error])
        .mount(
            "/",
            routes![
                index,
                health,
                ingest_live,
                ingest_demo,
                summary,
                snapshots,
                snapshot_rows,
                snapshot_summary,
                favicon,
            ],
        );

    if static_path.is_dir() {
        info!("Serving static files from {}", static_path.display());
        rocket = rocket.mount("/static", FileServer::from(static_path));
    }

    rocket
}

// Main server start function
pub async fn start_web_server(config: ConfigManager) -> Result<()> {
    config.ensure_directories().await?;
    let db = Database::new(&config.environment.database_path).await?;
    if let Err(e) = db.health_check().await {
        error!("Database is not usable: {}", e);
        return Err(e);
    }

    info!("Starting RHome EOD dashboard");
    info!("Database: {}", config.environment.database_path.display());

    let _rocket = build_rocket(config, db)
        .launch()
        .await
        .map_err(|e| anyhow::anyhow!("Server failed: {}", e))?;

    Ok(())
}
