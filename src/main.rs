//! ostor-usage - Collect and summarize object storage usage statistics

use anyhow::Context;
use clap::Parser;
use ostor_usage::{
    UsageCollector,
    cli::{Cli, normalize_legacy_args},
    types::UsageSummary,
};
use ostor_usage_client::OstorClient;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "ostor_usage=info,ostor_usage_core=info,ostor_usage_client=info";

fn init_logging(cli: &Cli) {
    // --quiet and --verbose override RUST_LOG
    let filter = if cli.quiet {
        tracing_subscriber::EnvFilter::new("warn")
    } else if cli.verbose {
        tracing_subscriber::EnvFilter::new(
            "ostor_usage=debug,ostor_usage_core=debug,ostor_usage_client=debug",
        )
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    // stdout carries the summary JSON, logs go to stderr
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_summary(summary: &UsageSummary, pretty: bool) -> anyhow::Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(summary)
    } else {
        serde_json::to_string(summary)
    }
    .context("failed to serialize usage summary")?;
    println!("{json}");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_from(normalize_legacy_args(std::env::args()));
    init_logging(&cli);

    let client = OstorClient::new(cli.client_config()).context("invalid admin API settings")?;
    info!("Collecting usage from {}", client.endpoint());

    let collector = UsageCollector::new(Arc::new(client), cli.collector_config())
        .context("invalid collector settings")?;
    collector
        .prepare()
        .await
        .context("failed to create output directories")?;

    match cli.interval {
        None => {
            let summary = collector.run().await;
            print_summary(&summary, true)?;
        }
        Some(seconds) => {
            info!("Collecting every {}s, press Ctrl+C to stop", seconds);
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for Ctrl+C: {}", e);
                    std::future::pending::<()>().await;
                }
            };

            let mut print_failure = None;
            let runs = collector
                .run_every(Duration::from_secs(seconds), shutdown, |summary| {
                    if print_failure.is_none()
                        && let Err(e) = print_summary(summary, false)
                    {
                        print_failure = Some(e);
                    }
                })
                .await;
            info!("Finished after {} runs", runs);

            if let Some(e) = print_failure {
                return Err(e);
            }
        }
    }

    Ok(())
}
