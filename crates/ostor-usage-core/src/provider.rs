//! Admin API seam
//!
//! This module defines the `UsageApi` trait the collector talks to. The
//! signed HTTP client in `ostor-usage-client` implements it; tests use an
//! in-memory implementation.

use crate::error::Result;
use crate::types::{ObjectName, UsageListing};
use async_trait::async_trait;

/// Operations the collector needs from the object storage admin API
#[async_trait]
pub trait UsageApi: Send + Sync {
    /// List the names of all pending usage objects
    async fn list_usage_objects(&self) -> Result<UsageListing>;

    /// Fetch the raw usage document of one object
    async fn fetch_usage_object(&self, object: &ObjectName) -> Result<serde_json::Value>;

    /// Remove a processed usage object from the remote store
    async fn delete_usage_object(&self, object: &ObjectName) -> Result<()>;
}
