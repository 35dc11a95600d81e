// src/slack.rs
//! Post the end-of-day digest to a Slack incoming webhook

use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

use crate::metrics::{SnapshotSummary, Totals};

const WEBHOOK_TIMEOUT_SECS: u64 = 15;

pub async fn share_summary(webhook_url: &str, text: &str, blocks: Option<Value>) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECS))
        .build()
        .context("Failed to create HTTP client")?;

    let mut payload = json!({ "text": text });
    if let Some(blocks) = blocks {
        payload["blocks"] = blocks;
    }

    let response = client
        .post(webhook_url)
        .json(&payload)
        .send()
        .await
        .context("Slack webhook request failed")?;

    let status = response.status();
    if status.as_u16() >= 300 {
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("Slack webhook error {}: {}", status.as_u16(), body);
    }

    info!("Summary posted to Slack");
    Ok(())
}

fn money(value: f64) -> String {
    format!("${:.0}", value)
}

fn pct(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.1}%", v * 100.0))
        .unwrap_or_else(|| "n/a".to_string())
}

fn totals_line(totals: &Totals) -> String {
    format!(
        "{} active jobs | today {:.1}h / {} | GM to date {} | burn {}",
        totals.job_count,
        totals.hours_today,
        money(totals.cost_today),
        pct(totals.gm_to_date_pct),
        pct(totals.burn_pct)
    )
}

/// Plain-text digest of one snapshot summary
pub fn summary_text(latest: &SnapshotSummary) -> String {
    let summary = &latest.summary;
    let mut lines = vec![
        format!("EOD summary for {}", latest.snapshot.snapshot_date),
        totals_line(&summary.totals),
    ];

    let top: Vec<String> = summary
        .top_cost_today
        .iter()
        .filter(|job| job.cost_today > 0.0)
        .map(|job| format!("• {} {}", job.job_name, money(job.cost_today)))
        .collect();
    if !top.is_empty() {
        lines.push("Top cost today:".to_string());
        lines.extend(top);
    }

    if !summary.at_risk.is_empty() {
        lines.push("At risk:".to_string());
        lines.extend(summary.at_risk.iter().map(|job| {
            format!(
                "• {} burn {} GM {}",
                job.job_name,
                pct(job.burn_pct),
                pct(job.gm_actual_pct)
            )
        }));
    }

    if !summary.exceptions.is_empty() {
        lines.push("Idle 3+ days:".to_string());
        lines.extend(
            summary
                .exceptions
                .iter()
                .map(|idle| format!("• {} ({} days)", idle.job.job_name, idle.idle_days)),
        );
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::compute_summary;
    use crate::types::{JobRecord, Snapshot};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn latest(rows: Vec<JobRecord>) -> SnapshotSummary {
        let date = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        SnapshotSummary {
            snapshot: Snapshot {
                id: 3,
                as_of: Utc.with_ymd_and_hms(2024, 5, 10, 17, 0, 0).unwrap(),
                snapshot_date: date,
            },
            summary: compute_summary(rows, &[], date),
        }
    }

    #[test]
    fn test_summary_text_lists_sections() {
        let rows = vec![
            JobRecord {
                job_id: 1,
                job_name: "Deck".to_string(),
                cost_today: 250.0,
                hours_today: 4.0,
                estimated_revenue: 1000.0,
                estimated_cost: 500.0,
                actual_cost_to_date: 450.0,
                burn_pct: Some(0.9),
                gm_actual_pct: Some(0.55),
                ..Default::default()
            },
            JobRecord {
                job_id: 2,
                job_name: "Fence".to_string(),
                ..Default::default()
            },
        ];
        let text = summary_text(&latest(rows));

        assert!(text.starts_with("EOD summary for 2024-05-10"));
        assert!(text.contains("2 active jobs | today 4.0h / $250 | GM to date 55.0% | burn 90.0%"));
        assert!(text.contains("Top cost today:\n• Deck $250"));
        assert!(text.contains("At risk:\n• Deck burn 90.0% GM 55.0%"));
        assert!(!text.contains("Fence $0"));
        assert!(!text.contains("Idle 3+ days"));
    }

    #[test]
    fn test_summary_text_for_empty_snapshot() {
        let text = summary_text(&latest(Vec::new()));
        assert_eq!(
            text,
            "EOD summary for 2024-05-10\n0 active jobs | today 0.0h / $0 | GM to date n/a | burn n/a"
        );
    }
}
