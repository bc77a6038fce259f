//! Core types, counter aggregation, and persistence for ostor-usage
//!
//! This crate provides the building blocks of a usage collection run:
//! counter trees and their merge, the readiness filter that decides which
//! usage objects are settled, the per-run aggregate, document persistence,
//! and the `UsageApi` trait the admin client implements.

pub mod aggregate;
pub mod config;
pub mod counters;
pub mod error;
pub mod persist;
pub mod provider;
pub mod raw_cache;
pub mod readiness;
pub mod types;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types
pub use aggregate::UsageAggregate;
pub use counters::{CounterTree, CounterValue, merge_counters};
pub use error::{Result, UsageError};
pub use provider::UsageApi;
pub use readiness::{ReadinessFilter, ReadySelection};
pub use types::{AggregateKey, ObjectName, SummaryStatus, UsageItem, UsageRow, UsageSummary};
