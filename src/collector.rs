//! Usage collection run orchestration
//!
//! A run lists every pending usage object, keeps those outside the guard
//! window, fetches and aggregates them under the concurrency limit, builds
//! and persists the summary, and finally (when enabled) deletes the
//! processed objects from the remote store.
//!
//! # Examples
//!
//! ```no_run
//! use ostor_usage::collector::UsageCollector;
//! use ostor_usage_client::{ClientConfig, OstorClient};
//! use ostor_usage_core::config::CollectorConfig;
//! use std::sync::Arc;
//!
//! # async fn example() -> ostor_usage_core::Result<()> {
//! let client = OstorClient::new(ClientConfig::new("s3.example.com", "access", "secret"))?;
//! let collector = UsageCollector::new(Arc::new(client), CollectorConfig::new("/var/lib/ostor-usage"))?;
//! collector.prepare().await?;
//!
//! let summary = collector.run().await;
//! println!("{}: {} rows", summary.status, summary.summarized_data.len());
//! # Ok(())
//! # }
//! ```

use crate::fetch::{FetchCoordinator, RunContext};
use crate::summary::SummaryBuilder;
use ostor_usage_core::config::CollectorConfig;
use ostor_usage_core::error::Result;
use ostor_usage_core::persist::DocumentStore;
use ostor_usage_core::provider::UsageApi;
use ostor_usage_core::readiness::ReadinessFilter;
use ostor_usage_core::types::UsageSummary;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

/// Shortest period [`UsageCollector::run_every`] accepts; shorter ones are raised to it
pub const MIN_RUN_PERIOD: Duration = Duration::from_millis(1);

/// Drives collection runs against one admin API
pub struct UsageCollector {
    api: Arc<dyn UsageApi>,
    config: CollectorConfig,
    filter: ReadinessFilter,
    store: Arc<DocumentStore>,
    fetcher: FetchCoordinator,
    summaries: SummaryBuilder,
}

impl UsageCollector {
    /// Create a collector
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid
    pub fn new(api: Arc<dyn UsageApi>, config: CollectorConfig) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(DocumentStore::new(config.paths.clone()));
        let fetcher = FetchCoordinator::new(Arc::clone(&api), Arc::clone(&store), config.concurrency)
            .with_save_chunks(config.save_chunks);

        Ok(Self {
            filter: ReadinessFilter::new(config.usage_period_secs),
            summaries: SummaryBuilder::new(Arc::clone(&store)),
            api,
            config,
            store,
            fetcher,
        })
    }

    /// Settings this collector runs with
    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Create the output directories
    pub async fn prepare(&self) -> Result<()> {
        self.store.ensure_directories().await
    }

    /// Perform one collection run
    ///
    /// Never fails: a listing failure produces an `error` summary with zero
    /// counts, and per-object failures only reduce what gets aggregated.
    pub async fn run(&self) -> UsageSummary {
        let ctx = Arc::new(RunContext::new());

        let listing = match self.api.list_usage_objects().await {
            Ok(listing) => listing,
            Err(e) => {
                error!("Listing usage objects failed: {}", e);
                return self.summaries.build(&ctx.aggregate, 0, 0, true).await;
            }
        };

        let received_items = listing.items.len();
        debug!("Got {} objects from statistics", received_items);

        let selection = self.filter.select(&listing.items);
        let processed_requests = selection.ready.len();

        if selection.is_empty() {
            warn!("No objects to process (all in guard zone)");
            return self
                .summaries
                .build(&ctx.aggregate, received_items, processed_requests, false)
                .await;
        }

        ctx.aggregate.reset();
        self.fetcher.run(&selection.ready, &ctx).await;

        let summary = self
            .summaries
            .build(&ctx.aggregate, received_items, processed_requests, false)
            .await;

        if self.config.remove_items {
            self.fetcher.delete_all(&selection.ready).await;
        }

        summary
    }

    /// Run repeatedly every `period` until `shutdown` resolves
    ///
    /// The first run starts immediately. A run in progress is always
    /// finished before shutdown is honoured. A period below
    /// [`MIN_RUN_PERIOD`] is raised to it. Returns the number of runs.
    pub async fn run_every<S, F>(&self, period: Duration, shutdown: S, mut on_summary: F) -> usize
    where
        S: Future<Output = ()>,
        F: FnMut(&UsageSummary),
    {
        if period < MIN_RUN_PERIOD {
            warn!("Run period {:?} is too short, using {:?}", period, MIN_RUN_PERIOD);
        }
        let mut ticker = interval(period.max(MIN_RUN_PERIOD));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        let mut runs = 0;
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Stopping periodic collection after {} runs", runs);
                    break;
                }
                _ = ticker.tick() => {
                    let summary = self.run().await;
                    runs += 1;
                    on_summary(&summary);
                }
            }
        }
        runs
    }
}
