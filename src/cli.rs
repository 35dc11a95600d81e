// src/cli.rs
use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::core::{ConfigManager, Database};
use crate::ingest::{ingest_demo, ingest_live_with_budget};
use crate::metrics::latest_summary;
use crate::slack::{share_summary, summary_text};
use crate::web::start_web_server;

#[derive(Parser)]
#[command(name = "rhome-eod")]
#[command(about = "End-of-day job cost dashboard backed by Simpro")]
pub struct EodCli {
    #[command(subcommand)]
    pub command: Option<EodCommand>,
}

#[derive(Subcommand)]
pub enum EodCommand {
    /// Start the dashboard web server (default)
    Serve,
    /// Run one live ingest against Simpro
    Ingest {
        /// Time budget in seconds; defaults to SIMPRO_INGEST_SECONDS
        #[arg(long)]
        seconds: Option<u64>,
    },
    /// Clone the latest snapshot, or try a short live ingest when there is none
    Demo,
    /// Print the latest end-of-day summary
    Summary {
        /// Also post it to SLACK_WEBHOOK_URL
        #[arg(long)]
        slack: bool,
    },
    /// List recent ingest runs
    Runs {
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
}

async fn open_database(config: &ConfigManager) -> Result<Database> {
    config.ensure_directories().await?;
    Database::new(&config.environment.database_path).await
}

pub async fn handle_command(cli: EodCli, config: ConfigManager) -> Result<()> {
    match cli.command.unwrap_or(EodCommand::Serve) {
        EodCommand::Serve => start_web_server(config).await,

        EodCommand::Ingest { seconds } => {
            let db = open_database(&config).await?;
            let budget = seconds.unwrap_or(config.ingest.budget_seconds);
            let report = ingest_live_with_budget(&config, &db, budget).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }

        EodCommand::Demo => {
            let db = open_database(&config).await?;
            let report = ingest_demo(&config, &db).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.ok {
                anyhow::bail!(
                    "Demo load stored an empty snapshot: {}",
                    report.error.as_deref().unwrap_or("unknown error")
                );
            }
            Ok(())
        }

        EodCommand::Summary { slack } => {
            let db = open_database(&config).await?;
            let Some(latest) = latest_summary(&db).await? else {
                println!("No snapshot yet. Run `rhome-eod ingest` or `rhome-eod demo` first.");
                return Ok(());
            };

            let text = summary_text(&latest);
            println!("{}", text);

            if slack {
                match &config.slack_webhook_url {
                    Some(url) => share_summary(url, &text, None).await?,
                    None => warn!("--slack given but SLACK_WEBHOOK_URL is not set"),
                }
            }
            Ok(())
        }

        EodCommand::Runs { limit } => {
            let db = open_database(&config).await?;
            let runs = db.runs().recent_runs(limit).await?;
            if runs.is_empty() {
                info!("No ingest history yet.");
            }
            for run in runs {
                println!(
                    "#{:<4} {:<5} {} {} tried={} inserted={} {}",
                    run.id,
                    run.mode,
                    run.started_at.format("%Y-%m-%d %H:%M:%S"),
                    if run.ok { "ok  " } else { "FAIL" },
                    run.jobs_tried,
                    run.jobs_inserted,
                    run.note.unwrap_or_default()
                );
            }
            Ok(())
        }
    }
}
