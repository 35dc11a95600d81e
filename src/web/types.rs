// src/web/types.rs

use rocket::response::status::Custom;
use rocket::response::Redirect;
use rocket::serde::json::Json;
use rocket::Responder;
use serde::Serialize;

use crate::core::{ConfigManager, Database};

/// Managed state shared by every route
pub struct ServerState {
    pub config: ConfigManager,
    pub db: Database,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// A finished ingest sends the browser back to the dashboard; anything else is
/// reported as JSON with a 500
#[derive(Responder)]
pub enum IngestResponse {
    Done(Redirect),
    Failed(Custom<Json<serde_json::Value>>),
}
