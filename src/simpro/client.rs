// src/simpro/client.rs
//! Bearer-token HTTP client for the Simpro jobs endpoints

use anyhow::{Context, Result};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{JobProbe, JobSource};
use crate::core::SimproCredentials;

const DEFAULT_TIMEOUT_SECS: u64 = 25;
const PREFIX_PROBE_TIMEOUT_SECS: u64 = 5;

/// Prefixes seen across tenants, most likely first
const CANDIDATE_PREFIXES: [&str; 3] = ["/api/v1.0", "/api/v1.1", "/api"];

pub struct SimproClient {
    client: reqwest::Client,
    base_url: String,
    api_prefix: String,
    pinned_prefix: bool,
    company_id: u64,
}

impl SimproClient {
    pub fn new(creds: &SimproCredentials, token: &str) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        let bearer = format!("Bearer {}", token);
        headers.insert(
            reqwest::header::AUTHORIZATION,
            bearer
                .parse::<reqwest::header::HeaderValue>()
                .context("Access token is not a valid header value")?,
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        let (api_prefix, pinned_prefix) = match &creds.api_prefix {
            Some(prefix) => (prefix.clone(), true),
            None => (SimproCredentials::default_prefix().to_string(), false),
        };

        Ok(Self {
            client,
            base_url: creds.base_url.clone(),
            api_prefix,
            pinned_prefix,
            company_id: creds.company_id,
        })
    }

    /// Pick the first API prefix whose companies listing answers 2xx.
    /// Keeps the default when nothing answers; a configured prefix is never probed.
    pub async fn resolve_api_prefix(&mut self) {
        if self.pinned_prefix {
            info!("Using configured API prefix {}", self.api_prefix);
            return;
        }

        for prefix in CANDIDATE_PREFIXES {
            let url = format!("{}{}/companies/", self.base_url, prefix);
            let probe = self
                .client
                .get(&url)
                .timeout(Duration::from_secs(PREFIX_PROBE_TIMEOUT_SECS))
                .send()
                .await;
            match probe {
                Ok(response) if response.status().is_success() => {
                    info!("API prefix resolved: {}", prefix);
                    self.api_prefix = prefix.to_string();
                    return;
                }
                Ok(response) => debug!("Prefix {} answered {}", prefix, response.status()),
                Err(e) => debug!("Prefix {} unreachable: {}", prefix, e),
            }
        }

        warn!(
            "No API prefix answered, keeping {}",
            SimproCredentials::default_prefix()
        );
        self.api_prefix = SimproCredentials::default_prefix().to_string();
    }

    pub fn job_url(&self, job_id: i64) -> String {
        format!(
            "{}{}/companies/{}/jobs/{}",
            self.base_url, self.api_prefix, self.company_id, job_id
        )
    }
}

#[rocket::async_trait]
impl JobSource for SimproClient {
    async fn fetch_job(&self, job_id: i64) -> JobProbe {
        let url = self.job_url(job_id);

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("GET {} failed: {}", url, e);
                return JobProbe::Unreachable;
            }
        };

        match response.status() {
            StatusCode::OK => match response.json().await {
                Ok(payload) => JobProbe::Found(payload),
                Err(e) => {
                    warn!("Job {} returned an unreadable body: {}", job_id, e);
                    JobProbe::Unreachable
                }
            },
            StatusCode::NOT_FOUND => JobProbe::Missing,
            other => JobProbe::Rejected(other.as_u16()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(prefix: Option<&str>) -> SimproCredentials {
        SimproCredentials {
            base_url: "https://rhome.simprosuite.com".to_string(),
            token_url: "https://rhome.simprosuite.com/oauth2/token".to_string(),
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            company_id: 3,
            api_prefix: prefix.map(str::to_string),
        }
    }

    #[test]
    fn test_job_url_uses_default_prefix() {
        let client = SimproClient::new(&creds(None), "tok").unwrap();
        assert_eq!(
            client.job_url(1234),
            "https://rhome.simprosuite.com/api/v1.0/companies/3/jobs/1234"
        );
    }

    #[test]
    fn test_configured_prefix_is_kept() {
        let client = SimproClient::new(&creds(Some("/api/v1.1")), "tok").unwrap();
        assert_eq!(
            client.job_url(5),
            "https://rhome.simprosuite.com/api/v1.1/companies/3/jobs/5"
        );
    }

    #[test]
    fn test_token_with_newline_is_rejected() {
        assert!(SimproClient::new(&creds(None), "bad\ntoken").is_err());
    }
}
