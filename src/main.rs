use anyhow::Result;
use clap::Parser;
use eod_dashboard::cli::{handle_command, EodCli};
use eod_dashboard::core::ConfigManager;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

#[tokio::main]
async fn main() -> Result<()> {
    Registry::default()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or(EnvFilter::new("eod_dashboard=INFO,rhome_eod=INFO,rocket::server=OFF")),
        )
        .init();

    let cli = EodCli::parse();
    let config = ConfigManager::load()?;

    tracing::info!(
        "Environment: {}",
        std::env::var("ENVIRONMENT").unwrap_or_else(|_| "local".to_string())
    );

    handle_command(cli, config).await
}
