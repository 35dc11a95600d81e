// src/core/config_manager.rs
//! Configuration: paths from `config.yaml` (optional), Simpro credentials and
//! ingest tuning from the environment

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::core::FsOps;

const DEFAULT_INGEST_SECONDS: u64 = 25;
/// Longest budget a single run may ask for
pub const MAX_INGEST_SECONDS: u64 = 3600;
const DEFAULT_API_PREFIX: &str = "/api/v1.0";

#[derive(Debug, Clone)]
pub struct ConfigManager {
    pub environment: EnvironmentConfig,
    pub simpro: SimproSettings,
    pub ingest: IngestConfig,
    pub slack_webhook_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub database_path: PathBuf,
    pub static_path: PathBuf,
    pub token_cache_path: PathBuf,
}

/// One environment section of `config.yaml`; every key is optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvironmentOverrides {
    pub database_path: Option<PathBuf>,
    pub static_path: Option<PathBuf>,
    pub token_cache_path: Option<PathBuf>,
    pub ingest_seconds: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    local: EnvironmentOverrides,
    #[serde(default)]
    production: EnvironmentOverrides,
}

/// Raw Simpro settings. Nothing is required until a live ingest asks for it,
/// so the dashboard can still start without credentials.
#[derive(Clone, Default)]
pub struct SimproSettings {
    pub base_url: Option<String>,
    pub token_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub company_id: u64,
    pub api_prefix: Option<String>,
}

#[derive(Clone)]
pub struct SimproCredentials {
    pub base_url: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub company_id: u64,
    pub api_prefix: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Wall-clock budget for one live run
    pub budget_seconds: u64,
    /// Early stop once this many active jobs are collected...
    pub enough_jobs: usize,
    /// ...and this share of the budget has elapsed
    pub enough_fraction: f64,
    /// Share of the budget the high-water mark search may use
    pub discovery_fraction: f64,
    /// Where to start walking down when discovery fails and the db knows nothing
    pub fallback_high_id: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            budget_seconds: DEFAULT_INGEST_SECONDS,
            enough_jobs: 150,
            enough_fraction: 0.6,
            discovery_fraction: 0.25,
            fallback_high_id: 1200,
        }
    }
}

impl IngestConfig {
    pub fn with_budget(mut self, seconds: u64) -> Self {
        self.budget_seconds = seconds.min(MAX_INGEST_SECONDS);
        self
    }

    /// Wall-clock budget, capped at `MAX_INGEST_SECONDS`
    pub fn budget(&self) -> Duration {
        Duration::from_secs(self.budget_seconds.min(MAX_INGEST_SECONDS))
    }
}

impl ConfigManager {
    /// Load all configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::from_lookup(env_lookup)
    }

    /// Build the configuration from any variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = lookup("ENVIRONMENT").unwrap_or_else(|| "local".to_string());
        info!("Loading configuration for environment: {}", env);

        let base_dir = if env == "production" {
            PathBuf::from("/app")
        } else {
            std::env::current_dir().context("Failed to get current directory")?
        };

        let config_path = lookup("EOD_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| base_dir.join("config.yaml"));
        let overrides = Self::load_overrides(&config_path, &env)?;

        let mut environment = EnvironmentConfig {
            database_path: base_dir.join("eod.db"),
            static_path: base_dir.join("static"),
            token_cache_path: PathBuf::from("/tmp/token.json"),
        };
        if let Some(path) = &overrides.database_path {
            environment.database_path = FsOps::normalize_path(&base_dir, path);
        }
        if let Some(path) = &overrides.static_path {
            environment.static_path = FsOps::normalize_path(&base_dir, path);
        }
        if let Some(path) = &overrides.token_cache_path {
            environment.token_cache_path = FsOps::normalize_path(&base_dir, path);
        }
        if let Some(path) = lookup("EOD_DB_PATH") {
            environment.database_path = FsOps::normalize_path(&base_dir, Path::new(&path));
        }

        let mut ingest = IngestConfig::default();
        if let Some(seconds) = overrides.ingest_seconds {
            ingest = ingest.with_budget(seconds);
        }
        if let Some(raw) = lookup("SIMPRO_INGEST_SECONDS") {
            let seconds: u64 = raw
                .parse()
                .with_context(|| format!("SIMPRO_INGEST_SECONDS must be a number, got {}", raw))?;
            ingest = ingest.with_budget(seconds);
        }

        Ok(Self {
            environment,
            simpro: SimproSettings::from_lookup(&lookup)?,
            ingest,
            slack_webhook_url: lookup("SLACK_WEBHOOK_URL"),
        })
    }

    fn load_overrides(config_path: &Path, env: &str) -> Result<EnvironmentOverrides> {
        if !config_path.exists() {
            return Ok(EnvironmentOverrides::default());
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let file: ConfigFile = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        info!("Loaded overrides from {}", config_path.display());
        Ok(match env {
            "production" => file.production,
            _ => file.local,
        })
    }

    /// Ensure the directories the server writes into exist
    pub async fn ensure_directories(&self) -> Result<()> {
        if let Some(db_parent) = self.environment.database_path.parent() {
            FsOps::ensure_dir_exists(db_parent).await?;
        }
        Ok(())
    }
}

impl SimproSettings {
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let company_id = match lookup("SIMPRO_COMPANY_ID") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("SIMPRO_COMPANY_ID must be a number, got {}", raw))?,
            None => 0,
        };

        Ok(Self {
            base_url: lookup("SIMPRO_BASE_URL").map(|u| u.trim_end_matches('/').to_string()),
            token_url: lookup("SIMPRO_TOKEN_URL"),
            client_id: lookup("SIMPRO_CLIENT_ID"),
            client_secret: lookup("SIMPRO_CLIENT_SECRET"),
            company_id,
            api_prefix: lookup("SIMPRO_API_PREFIX").map(|p| normalize_prefix(&p)),
        })
    }

    /// Credentials for a live run, or the first missing variable
    pub fn require(&self) -> Result<SimproCredentials> {
        let base_url = required(&self.base_url, "SIMPRO_BASE_URL")?;
        let client_id = required(&self.client_id, "SIMPRO_CLIENT_ID")?;
        let client_secret = required(&self.client_secret, "SIMPRO_CLIENT_SECRET")?;
        let token_url = self
            .token_url
            .clone()
            .unwrap_or_else(|| format!("{}/oauth2/token", base_url));

        Ok(SimproCredentials {
            base_url,
            token_url,
            client_id,
            client_secret,
            company_id: self.company_id,
            api_prefix: self.api_prefix.clone(),
        })
    }
}

impl SimproCredentials {
    pub fn default_prefix() -> &'static str {
        DEFAULT_API_PREFIX
    }
}

impl fmt::Debug for SimproSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimproSettings")
            .field("base_url", &self.base_url)
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "***"))
            .field("company_id", &self.company_id)
            .field("api_prefix", &self.api_prefix)
            .finish()
    }
}

/// Environment lookup where blank values count as unset
pub fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(value: &Option<String>, name: &str) -> Result<String> {
    value
        .clone()
        .ok_or_else(|| anyhow::anyhow!("Missing required environment variable: {}", name))
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_require_reports_first_missing_variable() {
        let settings =
            SimproSettings::from_lookup(lookup_from(&[("SIMPRO_BASE_URL", "https://x.test")]))
                .unwrap();
        let err = settings.require().err().unwrap();
        assert_eq!(
            err.to_string(),
            "Missing required environment variable: SIMPRO_CLIENT_ID"
        );
    }

    #[test]
    fn test_token_url_defaults_to_base() {
        let settings = SimproSettings::from_lookup(lookup_from(&[
            ("SIMPRO_BASE_URL", "https://rhome.simprosuite.com/"),
            ("SIMPRO_CLIENT_ID", "id"),
            ("SIMPRO_CLIENT_SECRET", "secret"),
            ("SIMPRO_COMPANY_ID", "2"),
        ]))
        .unwrap();
        let creds = settings.require().unwrap();
        assert_eq!(creds.base_url, "https://rhome.simprosuite.com");
        assert_eq!(creds.token_url, "https://rhome.simprosuite.com/oauth2/token");
        assert_eq!(creds.company_id, 2);
        assert!(creds.api_prefix.is_none());
    }

    #[test]
    fn test_bad_company_id_is_an_error() {
        let result = SimproSettings::from_lookup(lookup_from(&[("SIMPRO_COMPANY_ID", "abc")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_prefix_normalization() {
        assert_eq!(normalize_prefix("api/v1.1/"), "/api/v1.1");
        assert_eq!(normalize_prefix("/api"), "/api");
    }

    #[test]
    fn test_debug_hides_secret() {
        let settings = SimproSettings {
            client_secret: Some("hunter2".to_string()),
            ..Default::default()
        };
        let rendered = format!("{:?}", settings);
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_env_overrides_paths_and_budget() {
        let config = ConfigManager::from_lookup(lookup_from(&[
            ("EOD_CONFIG", "/nonexistent/config.yaml"),
            ("EOD_DB_PATH", "/data/eod.db"),
            ("SIMPRO_INGEST_SECONDS", "40"),
        ]))
        .unwrap();
        assert_eq!(config.environment.database_path, PathBuf::from("/data/eod.db"));
        assert_eq!(config.ingest.budget_seconds, 40);
        assert!(config.slack_webhook_url.is_none());
    }

    #[test]
    fn test_oversized_budget_is_capped() {
        let config = ConfigManager::from_lookup(lookup_from(&[
            ("EOD_CONFIG", "/nonexistent/config.yaml"),
            ("SIMPRO_INGEST_SECONDS", "18446744073709551615"),
        ]))
        .unwrap();
        assert_eq!(config.ingest.budget_seconds, MAX_INGEST_SECONDS);

        let raw = IngestConfig {
            budget_seconds: u64::MAX,
            ..IngestConfig::default()
        };
        assert_eq!(raw.budget(), Duration::from_secs(MAX_INGEST_SECONDS));
        assert_eq!(IngestConfig::default().with_budget(90).budget_seconds, 90);
    }

    #[test]
    fn test_yaml_section_is_selected_by_environment() {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!("eod_config_{}.yaml", nanos));
        std::fs::write(
            &path,
            "local:\n  database_path: /tmp/local.db\n  ingest_seconds: 5\nproduction:\n  database_path: /data/prod.db\n",
        )
        .unwrap();
        let config_path = path.to_string_lossy().to_string();

        let local = ConfigManager::from_lookup(lookup_from(&[("EOD_CONFIG", config_path.as_str())])).unwrap();
        assert_eq!(local.environment.database_path, PathBuf::from("/tmp/local.db"));
        assert_eq!(local.ingest.budget_seconds, 5);

        let prod = ConfigManager::from_lookup(lookup_from(&[
            ("EOD_CONFIG", config_path.as_str()),
            ("ENVIRONMENT", "production"),
        ]))
        .unwrap();
        assert_eq!(prod.environment.database_path, PathBuf::from("/data/prod.db"));
        assert_eq!(prod.ingest.budget_seconds, DEFAULT_INGEST_SECONDS);

        let _ = std::fs::remove_file(path);
    }
}
