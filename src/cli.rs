//! CLI interface for ostor-usage
//!
//! Every option can also be given through the environment. The legacy
//! `KEY=VALUE` argument style (`PUBLIC_S3_KEY=... S3_USAGE_PERIOD=1800`) is
//! still accepted and rewritten to long options before parsing.
//!
//! # Example
//!
//! ```bash
//! # One run, summary printed to stdout
//! ostor-usage --endpoint s3.example.com:8443 --access-key AK --secret-key SK
//!
//! # Legacy style, deleting processed objects
//! ostor-usage PUBLIC_S3_KEY=AK SECRET_S3_KEY=SK S3_SERVERNOHTTPS=s3.example.com S3_REMOVE_STATS_ITEMS=1
//!
//! # Collect every 10 minutes until interrupted
//! ostor-usage --interval 600
//! ```

use clap::Parser;
use ostor_usage_client::ClientConfig;
use ostor_usage_core::config::{
    CollectorConfig, DEFAULT_CONCURRENCY, DEFAULT_USAGE_PERIOD_SECS, OutputPaths,
};
use ostor_usage_core::error::{Result, UsageError};
use std::path::PathBuf;
use std::time::Duration;

/// Collect and summarize per-bucket usage statistics from the object storage admin API
#[derive(Parser, Debug, Clone)]
#[command(name = "ostor-usage")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Access key id for the admin API
    #[arg(long, env = "PUBLIC_S3_KEY", hide_env_values = true)]
    pub access_key: String,

    /// Secret key for the admin API
    #[arg(long, env = "SECRET_S3_KEY", hide_env_values = true)]
    pub secret_key: String,

    /// Admin API endpoint (https is assumed when no scheme is given)
    #[arg(long, env = "S3_SERVERNOHTTPS")]
    pub endpoint: String,

    /// Guard window in seconds; objects newer than the newest minus this are left for later
    #[arg(long, env = "S3_USAGE_PERIOD", default_value_t = DEFAULT_USAGE_PERIOD_SECS)]
    pub usage_period: u64,

    /// Delete processed usage objects after the summary is built
    #[arg(long, env = "S3_REMOVE_STATS_ITEMS")]
    pub remove_items: bool,

    /// Save every fetched usage object as a chunk file
    #[arg(long, env = "S3_SAVE_STATS_CHUNKS")]
    pub save_chunks: bool,

    /// Maximum number of concurrent admin API calls
    #[arg(long, env = "S3_USAGE_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY, value_parser = parse_concurrency)]
    pub concurrency: usize,

    /// Root directory for results, chunks and backups
    #[arg(long, env = "S3_USAGE_OUTPUT_DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Canonical summary file (defaults to <output-dir>/results/summarized_data.json)
    #[arg(long, env = "S3_USAGE_SUMMARY_FILE")]
    pub summary_file: Option<PathBuf>,

    /// Run every N seconds until interrupted instead of once
    #[arg(long, env = "S3_USAGE_INTERVAL", value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,

    /// Show debug output
    #[arg(long, short = 'v', conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only show warnings and errors
    #[arg(long, short = 'q')]
    pub quiet: bool,
}

impl Cli {
    /// Collector settings described by the arguments
    pub fn collector_config(&self) -> CollectorConfig {
        let mut paths = OutputPaths::under(&self.output_dir);
        if let Some(summary_file) = &self.summary_file {
            paths = paths.with_summary_file(summary_file);
        }

        CollectorConfig {
            usage_period_secs: self.usage_period,
            concurrency: self.concurrency,
            remove_items: self.remove_items,
            save_chunks: self.save_chunks,
            paths,
        }
    }

    /// Admin API client settings described by the arguments
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(&self.endpoint, &self.access_key, &self.secret_key)
            .with_timeout(Duration::from_secs(self.timeout))
    }
}

/// Parse a concurrency limit, which must be at least 1
pub fn parse_concurrency(s: &str) -> Result<usize> {
    let value: usize = s
        .trim()
        .parse()
        .map_err(|_| UsageError::InvalidArgument(format!("'{s}' is not a number")))?;
    if value == 0 {
        return Err(UsageError::InvalidArgument(
            "concurrency must be at least 1".to_string(),
        ));
    }
    Ok(value)
}

/// Legacy `KEY=VALUE` arguments and the long options they map to
const LEGACY_OPTIONS: &[(&str, &str)] = &[
    ("PUBLIC_S3_KEY", "--access-key"),
    ("SECRET_S3_KEY", "--secret-key"),
    ("S3_SERVERNOHTTPS", "--endpoint"),
    ("S3_USAGE_PERIOD", "--usage-period"),
];

/// Legacy `KEY=VALUE` switches and the flags they map to
const LEGACY_FLAGS: &[(&str, &str)] = &[
    ("S3_REMOVE_STATS_ITEMS", "--remove-items"),
    ("S3_SAVE_STATS_CHUNKS", "--save-chunks"),
];

fn is_falsey(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "no" | "off"
    )
}

/// Rewrite legacy `KEY=VALUE` arguments into long options
///
/// The first argument (program name) and anything starting with `-` pass
/// through untouched. Unknown `KEY=VALUE` pairs are dropped.
pub fn normalize_legacy_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut normalized: Vec<String> = args.next().into_iter().collect();

    for arg in args {
        if arg.starts_with('-') {
            normalized.push(arg);
            continue;
        }
        let Some((key, value)) = arg.split_once('=') else {
            normalized.push(arg);
            continue;
        };
        let key = key.trim();
        let value = value.trim();

        if let Some((_, option)) = LEGACY_OPTIONS.iter().find(|(name, _)| *name == key) {
            normalized.push(format!("{option}={value}"));
        } else if let Some((_, flag)) = LEGACY_FLAGS.iter().find(|(name, _)| *name == key) {
            if !is_falsey(value) {
                normalized.push((*flag).to_string());
            }
        }
    }

    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_with_options() {
        let cli = Cli::try_parse_from([
            "ostor-usage",
            "--access-key",
            "AK",
            "--secret-key",
            "SK",
            "--endpoint",
            "s3.example.com",
            "--usage-period",
            "1800",
            "--concurrency",
            "4",
            "--save-chunks",
            "--output-dir",
            "/srv/usage",
        ])
        .unwrap();

        let config = cli.collector_config();
        assert_eq!(config.usage_period_secs, 1800);
        assert_eq!(config.concurrency, 4);
        assert!(config.save_chunks);
        assert!(!config.remove_items);
        assert_eq!(
            config.paths.summary_file,
            PathBuf::from("/srv/usage/results/summarized_data.json")
        );

        let client = cli.client_config();
        assert_eq!(client.endpoint, "s3.example.com");
        assert_eq!(client.timeout, Duration::from_secs(20));
    }

    #[test]
    fn test_legacy_args_are_rewritten() {
        let normalized = normalize_legacy_args(args(&[
            "ostor-usage",
            "PUBLIC_S3_KEY=AK",
            "SECRET_S3_KEY=SK=with=equals",
            "S3_SERVERNOHTTPS=s3.example.com",
            "S3_USAGE_PERIOD=600",
            "S3_REMOVE_STATS_ITEMS=1",
            "S3_SAVE_STATS_CHUNKS=false",
            "UNKNOWN=whatever",
            "--verbose",
        ]));

        assert_eq!(
            normalized,
            args(&[
                "ostor-usage",
                "--access-key=AK",
                "--secret-key=SK=with=equals",
                "--endpoint=s3.example.com",
                "--usage-period=600",
                "--remove-items",
                "--verbose",
            ])
        );

        let cli = Cli::try_parse_from(normalized).unwrap();
        assert_eq!(cli.secret_key, "SK=with=equals");
        assert_eq!(cli.usage_period, 600);
        assert!(cli.remove_items);
        assert!(!cli.save_chunks);
        assert!(cli.verbose);
    }

    #[test]
    fn test_summary_file_override() {
        let cli = Cli::try_parse_from([
            "ostor-usage",
            "--access-key=AK",
            "--secret-key=SK",
            "--endpoint=s3.example.com",
            "--summary-file=/tmp/summary.json",
        ])
        .unwrap();

        assert_eq!(
            cli.collector_config().paths.summary_file,
            PathBuf::from("/tmp/summary.json")
        );
    }

    #[test]
    fn test_rejects_zero_concurrency_and_interval() {
        let base = ["ostor-usage", "--access-key=AK", "--secret-key=SK", "--endpoint=e"];

        let mut zero_concurrency = base.to_vec();
        zero_concurrency.push("--concurrency=0");
        assert!(Cli::try_parse_from(zero_concurrency).is_err());

        let mut zero_interval = base.to_vec();
        zero_interval.push("--interval=0");
        assert!(Cli::try_parse_from(zero_interval).is_err());
    }

    #[test]
    fn test_parse_concurrency() {
        assert_eq!(parse_concurrency("12").unwrap(), 12);
        assert!(parse_concurrency("0").is_err());
        assert!(parse_concurrency("many").is_err());
    }
}
