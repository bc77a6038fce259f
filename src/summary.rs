//! Summary construction and persistence
//!
//! The builder drains the run's aggregate into a [`UsageSummary`], decides
//! its status, and writes it to the canonical path, a timestamped results
//! copy and a timestamped backup. Persistence problems are logged; the
//! summary is returned either way.

use chrono::{DateTime, Local};
use ostor_usage_core::aggregate::UsageAggregate;
use ostor_usage_core::persist::DocumentStore;
use ostor_usage_core::types::UsageSummary;
use std::sync::Arc;
use tracing::{error, info};

/// Builds and persists run summaries
#[derive(Debug, Clone)]
pub struct SummaryBuilder {
    store: Arc<DocumentStore>,
}

impl SummaryBuilder {
    /// Create a builder writing through `store`
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }

    /// Build the summary for a run and persist it
    ///
    /// - `errored` yields status `error` with whatever the aggregate holds;
    /// - otherwise zero `processed_requests` yields `skip` with no rows;
    /// - otherwise the status is `done`.
    pub async fn build(
        &self,
        aggregate: &UsageAggregate,
        received_items: usize,
        processed_requests: usize,
        errored: bool,
    ) -> UsageSummary {
        self.build_at(aggregate, received_items, processed_requests, errored, Local::now())
            .await
    }

    /// [`SummaryBuilder::build`] with an explicit timestamp for the file names
    pub async fn build_at(
        &self,
        aggregate: &UsageAggregate,
        received_items: usize,
        processed_requests: usize,
        errored: bool,
        at: DateTime<Local>,
    ) -> UsageSummary {
        let rows = aggregate.drain();
        let summary = UsageSummary::assemble(received_items, processed_requests, errored, rows);

        info!(
            "Built usage summary: status={}, rows={}, received_items={}, processed_requests={}",
            summary.status,
            summary.summarized_data.len(),
            received_items,
            processed_requests
        );

        let report = self.store.save_summary(&summary, at).await;
        if report.written.is_empty() {
            error!("Usage summary could not be written to any location");
        }

        summary
    }
}
