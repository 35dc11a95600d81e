// src/core/mod.rs
//! Configuration, storage and filesystem helpers shared by the CLI and the web server

pub mod config_manager;
pub mod database;
pub mod fs_ops;

pub use config_manager::{
    env_lookup, ConfigManager, EnvironmentConfig, EnvironmentOverrides, IngestConfig,
    SimproCredentials, SimproSettings,
};
pub use database::{Database, IngestRunRepository, SnapshotRepository};
pub use fs_ops::FsOps;
