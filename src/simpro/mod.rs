// src/simpro/mod.rs
//! Simpro REST access: token exchange, job lookups, high-water mark search
//! and mapping of job payloads onto `JobRecord`

pub mod auth;
pub mod client;
pub mod discovery;
pub mod extract;

pub use client::SimproClient;
pub use discovery::find_highest_job_id;
pub use extract::{extract_job_fields, is_active_project};

use serde_json::Value;

/// Result of looking up one job id
#[derive(Debug, Clone, PartialEq)]
pub enum JobProbe {
    Found(Value),
    /// 404: the id does not exist
    Missing,
    /// Any other HTTP status
    Rejected(u16),
    /// Transport failure or a body that is not JSON
    Unreachable,
}

impl JobProbe {
    pub fn exists(&self) -> bool {
        matches!(self, JobProbe::Found(_))
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, JobProbe::Missing)
    }
}

/// Anything that can answer "does job N exist, and what does it look like"
#[rocket::async_trait]
pub trait JobSource: Send + Sync {
    async fn fetch_job(&self, job_id: i64) -> JobProbe;
}
