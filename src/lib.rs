//! ostor-usage - Collect and summarize object storage usage statistics
//!
//! This library provides functionality to:
//! - List pending usage objects from the signed `ostor-usage` admin API
//! - Keep only objects outside the guard window of the newest one
//! - Fetch and merge their counters per bucket and user under a concurrency limit
//! - Persist the summary (and optional raw chunks) atomically to disk
//! - Optionally delete processed objects from the remote store
//!
//! # Examples
//!
//! ```no_run
//! use ostor_usage::{UsageCollector, config::CollectorConfig};
//! use ostor_usage_client::{ClientConfig, OstorClient};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> ostor_usage::Result<()> {
//!     let client = OstorClient::new(ClientConfig::new("s3.example.com", "access", "secret"))?;
//!     let collector = UsageCollector::new(Arc::new(client), CollectorConfig::new("."))?;
//!     collector.prepare().await?;
//!
//!     let summary = collector.run().await;
//!     println!("{}", serde_json::to_string_pretty(&summary)?);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod collector;
pub mod fetch;
pub mod summary;

// Core building blocks, re-exported so callers only need this crate
pub use ostor_usage_core::{
    aggregate, config, counters, error, persist, provider, raw_cache, readiness, types,
};

// Re-export commonly used types
pub use collector::UsageCollector;
pub use error::{Result, UsageError};
pub use types::{SummaryStatus, UsageSummary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
