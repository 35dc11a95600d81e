// src/lib.rs
//! End-of-day job cost dashboard: Simpro ingest into SQLite snapshots,
//! summary metrics, a Rocket dashboard and a Slack digest

pub mod cli;
pub mod core;
pub mod ingest;
pub mod metrics;
pub mod simpro;
pub mod slack;
pub mod types;
pub mod web;

pub use crate::core::{ConfigManager, Database};
pub use web::{build_rocket, start_web_server};
