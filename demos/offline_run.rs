//! Offline collection run
//!
//! Serves a handful of usage objects from memory instead of a real admin API,
//! runs one collection into a temporary directory and prints the summary.

use async_trait::async_trait;
use ostor_usage::{
    Result, UsageCollector, UsageError,
    config::CollectorConfig,
    provider::UsageApi,
    types::{ObjectName, UsageListing},
};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Admin API backed by a fixed set of documents
struct InMemoryApi {
    objects: BTreeMap<ObjectName, Value>,
}

#[async_trait]
impl UsageApi for InMemoryApi {
    async fn list_usage_objects(&self) -> Result<UsageListing> {
        Ok(UsageListing {
            items: self.objects.keys().cloned().collect(),
        })
    }

    async fn fetch_usage_object(&self, object: &ObjectName) -> Result<Value> {
        self.objects.get(object).cloned().ok_or_else(|| UsageError::Http {
            status: 404,
            message: format!("NoSuchKey: {object}"),
        })
    }

    async fn delete_usage_object(&self, object: &ObjectName) -> Result<()> {
        println!("would delete {object}");
        Ok(())
    }
}

fn document(bucket: &str, user_id: &str, bytes: u64) -> Value {
    json!({
        "items": [{
            "key": {"bucket": bucket, "user_id": user_id},
            "counters": {"STANDARD": {"bytes": bytes, "ops": {"put": 1}}},
        }]
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let mut objects = BTreeMap::new();
    for (hour, bytes) in [(0, 100), (1, 250), (2, 75), (4, 9999)] {
        objects.insert(
            ObjectName::new(format!("node-1/usage-2024-01-01T{hour:02}:00:00Z")),
            document("photos", "alice", bytes),
        );
    }
    objects.insert(
        ObjectName::new("node-2/usage-2024-01-01T01:30:00.000Z"),
        document("backups", "bob", 4096),
    );

    let output = tempfile::tempdir()?;
    let config = CollectorConfig::new(output.path())
        .with_usage_period(3600)
        .with_save_chunks(true)
        .with_remove_items(true);

    let collector = UsageCollector::new(Arc::new(InMemoryApi { objects }), config)?;
    collector.prepare().await?;
    let summary = collector.run().await;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    println!("Output written under {}", output.path().display());
    Ok(())
}
