// src/types/response.rs
use serde::{Deserialize, Serialize};

// ===== Ingest Response Types =====

/// Outcome of one ingest, returned by the CLI, the web layer and logged
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub ok: bool,
    pub jobs: usize,
    pub tried: usize,
    pub snapshot_id: i64,
    pub elapsed_sec: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloned_from: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub ok: bool,
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
        }
    }
}
