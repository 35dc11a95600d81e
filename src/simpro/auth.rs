// src/simpro/auth.rs
//! OAuth2 client-credentials token exchange

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::core::{FsOps, SimproCredentials};

const TOKEN_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Exchange client id/secret for a bearer token
pub async fn fetch_token(creds: &SimproCredentials) -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(TOKEN_TIMEOUT_SECS))
        .build()
        .context("Failed to create HTTP client")?;

    info!("Authenticating with Simpro");

    let response = client
        .post(&creds.token_url)
        .basic_auth(&creds.client_id, Some(&creds.client_secret))
        .form(&[("grant_type", "client_credentials")])
        .send()
        .await
        .context("Token request failed")?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        anyhow::bail!("Token endpoint returned {}: {}", status, error_text);
    }

    let body: TokenResponse = response
        .json()
        .await
        .context("Failed to parse token response")?;
    let token = parse_access_token(body)?;

    info!("Token acquired (len={})", token.len());
    Ok(token)
}

fn parse_access_token(body: TokenResponse) -> Result<String> {
    match body.access_token {
        Some(token) if !token.trim().is_empty() => Ok(token),
        _ => anyhow::bail!("No access_token in token response"),
    }
}

/// Best-effort copy of the token for shell tooling; failures are only logged
pub async fn cache_token(path: &Path, token: &str) {
    let payload = serde_json::json!({
        "access_token": token,
        "fetched_at": chrono::Utc::now().timestamp(),
    });

    if let Err(e) = FsOps::write_file_safe(path, &payload.to_string()).await {
        warn!("Could not cache token to {}: {}", path.display(), e);
    }
}
