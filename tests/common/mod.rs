//! Common test utilities and helpers for ostor-usage tests
//!
//! [`MockUsageApi`] stands in for the admin API: it serves a fixed listing
//! and per-object documents, can be told to fail any call, and records
//! peak concurrency and deletions so tests can assert on them.

#![allow(dead_code)]

use async_trait::async_trait;
use ostor_usage::{
    config::CollectorConfig,
    error::{Result, UsageError},
    provider::UsageApi,
    types::{ObjectName, UsageListing},
};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

/// Scriptable in-memory admin API
#[derive(Default)]
pub struct MockUsageApi {
    listing: Vec<ObjectName>,
    documents: HashMap<ObjectName, Value>,
    fail_listing: bool,
    fail_fetch: HashSet<ObjectName>,
    fail_delete: HashSet<ObjectName>,
    fetch_delay: Option<Duration>,
    active: AtomicUsize,
    peak: AtomicUsize,
    fetched: Mutex<Vec<ObjectName>>,
    deleted: Mutex<Vec<ObjectName>>,
    list_calls: AtomicUsize,
}

impl MockUsageApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object to the listing, served with `document`
    pub fn with_object(mut self, name: &str, document: Value) -> Self {
        let name = ObjectName::new(name);
        self.listing.push(name.clone());
        self.documents.insert(name, document);
        self
    }

    /// Add an object to the listing without a document behind it
    pub fn with_listed(mut self, name: &str) -> Self {
        self.listing.push(ObjectName::new(name));
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn failing_fetch(mut self, name: &str) -> Self {
        self.fail_fetch.insert(ObjectName::new(name));
        self
    }

    pub fn failing_delete(mut self, name: &str) -> Self {
        self.fail_delete.insert(ObjectName::new(name));
        self
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    /// Highest number of fetches observed in flight at once
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Fetched objects, sorted
    pub fn fetched(&self) -> Vec<ObjectName> {
        let mut fetched = self.fetched.lock().unwrap().clone();
        fetched.sort();
        fetched
    }

    /// Deleted objects, sorted
    pub fn deleted(&self) -> Vec<ObjectName> {
        let mut deleted = self.deleted.lock().unwrap().clone();
        deleted.sort();
        deleted
    }
}

#[async_trait]
impl UsageApi for MockUsageApi {
    async fn list_usage_objects(&self) -> Result<UsageListing> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing {
            return Err(UsageError::Http {
                status: 503,
                message: "ServiceUnavailable".to_string(),
            });
        }
        Ok(UsageListing {
            items: self.listing.clone(),
        })
    }

    async fn fetch_usage_object(&self, object: &ObjectName) -> Result<Value> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        self.fetched.lock().unwrap().push(object.clone());
        if self.fail_fetch.contains(object) {
            return Err(UsageError::Http {
                status: 500,
                message: format!("InternalError fetching {object}"),
            });
        }
        self.documents
            .get(object)
            .cloned()
            .ok_or_else(|| UsageError::Http {
                status: 404,
                message: "NoSuchKey".to_string(),
            })
    }

    async fn delete_usage_object(&self, object: &ObjectName) -> Result<()> {
        if self.fail_delete.contains(object) {
            return Err(UsageError::Http {
                status: 500,
                message: "InternalError".to_string(),
            });
        }
        self.deleted.lock().unwrap().push(object.clone());
        Ok(())
    }
}

/// Usage object name for a node at a given instant
pub fn object_name(node: &str, timestamp: &str) -> String {
    format!("{node}/usage-{timestamp}")
}

/// One usage item in the admin API document shape
pub fn usage_item(bucket: &str, user_id: &str, counters: Value) -> Value {
    json!({
        "key": {"bucket": bucket, "user_id": user_id},
        "counters": counters,
    })
}

/// A usage object document holding `items`
pub fn usage_document(items: Vec<Value>) -> Value {
    json!({ "items": items })
}

/// Collector settings writing under a fresh temporary directory
pub fn temp_config() -> (TempDir, CollectorConfig) {
    let dir = TempDir::new().unwrap();
    let config = CollectorConfig::new(dir.path());
    (dir, config)
}
