//! Per-run usage aggregate keyed by bucket and user
//!
//! Fetch tasks feed usage items in concurrently; the summary builder drains
//! the result once all of them have finished. A single mutex guards the whole
//! map: merging is cheap next to the network calls that feed it.
//!
//! Merging is additive, so feeding the same object twice double-counts it.
//!
//! # Examples
//!
//! ```
//! use ostor_usage_core::aggregate::UsageAggregate;
//! use ostor_usage_core::counters::CounterTree;
//! use serde_json::json;
//!
//! let aggregate = UsageAggregate::new();
//! let counters = CounterTree::from_json(json!({"STANDARD": {"bytes": 100}})).unwrap();
//!
//! aggregate.add_usage_item("bucket-a", "user-1", &counters);
//! aggregate.add_usage_item("bucket-a", "user-1", &counters);
//!
//! let rows = aggregate.drain();
//! assert_eq!(rows.len(), 1);
//! ```

use crate::counters::{CounterTree, merge_counters};
use crate::types::{AggregateKey, UsageItem, UsageRow};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Accumulated counters for every (bucket, user) pair seen in a run
#[derive(Debug, Default)]
pub struct UsageAggregate {
    entries: Mutex<BTreeMap<AggregateKey, CounterTree>>,
}

impl UsageAggregate {
    /// Create an empty aggregate
    pub fn new() -> Self {
        Self::default()
    }

    // Every critical section leaves the map valid, so a poisoned lock is safe to reuse.
    fn lock(&self) -> MutexGuard<'_, BTreeMap<AggregateKey, CounterTree>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove every entry
    pub fn reset(&self) {
        self.lock().clear();
        debug!("Usage aggregate reset");
    }

    /// Add counters for a bucket and user
    ///
    /// The first counters seen for a key are stored as a copy; later ones are
    /// merged in with [`merge_counters`].
    pub fn add_usage_item(&self, bucket: &str, user_id: &str, counters: &CounterTree) {
        let key = AggregateKey::new(bucket, user_id);
        let mut entries = self.lock();
        match entries.get_mut(&key) {
            Some(existing) => merge_counters(existing, counters),
            None => {
                entries.insert(key, counters.clone());
            }
        }
        drop(entries);

        debug!(
            "Aggregated usage for bucket='{}', user_id='{}' (types: {:?})",
            bucket,
            user_id,
            counters.keys().collect::<Vec<_>>()
        );
    }

    /// Add an extracted usage item
    pub fn add(&self, item: &UsageItem) {
        self.add_usage_item(&item.bucket, &item.user_id, &item.counters);
    }

    /// Current contents as summary rows, one per key
    ///
    /// Rows come out in key order. The aggregate itself is left untouched.
    pub fn drain(&self) -> Vec<UsageRow> {
        self.lock()
            .iter()
            .map(|(key, counters)| UsageRow::new(key.clone(), counters.clone()))
            .collect()
    }

    /// Counters stored for one key
    pub fn get(&self, bucket: &str, user_id: &str) -> Option<CounterTree> {
        self.lock().get(&AggregateKey::new(bucket, user_id)).cloned()
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no key has been fed yet
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::counters;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_first_item_is_copied() {
        let aggregate = UsageAggregate::new();
        let mut source = counters(json!({"STANDARD": {"bytes": 100}}));

        aggregate.add_usage_item("bucket-a", "user-1", &source);
        source.merge(&counters(json!({"STANDARD": {"bytes": 1}})));

        assert_eq!(
            aggregate.get("bucket-a", "user-1"),
            Some(counters(json!({"STANDARD": {"bytes": 100}})))
        );
    }

    #[test]
    fn test_same_key_merges() {
        let aggregate = UsageAggregate::new();
        aggregate.add_usage_item("bucket-a", "user-1", &counters(json!({"STANDARD": {"bytes": 100}})));
        aggregate.add_usage_item(
            "bucket-a",
            "user-1",
            &counters(json!({"STANDARD": {"bytes": 50}, "COLD": {"bytes": 10}})),
        );

        assert_eq!(aggregate.len(), 1);
        assert_eq!(
            aggregate.get("bucket-a", "user-1"),
            Some(counters(json!({"STANDARD": {"bytes": 150}, "COLD": {"bytes": 10}})))
        );
    }

    #[test]
    fn test_distinct_keys_stay_separate() {
        let aggregate = UsageAggregate::new();
        let c = counters(json!({"STANDARD": {"bytes": 1}}));
        aggregate.add_usage_item("bucket-a", "user-1", &c);
        aggregate.add_usage_item("bucket-a", "user-2", &c);
        aggregate.add_usage_item("bucket-b", "user-1", &c);

        let rows = aggregate.drain();
        let keys: Vec<_> = rows.iter().map(|r| (r.bucket.as_str(), r.user_id.as_str())).collect();
        assert_eq!(
            keys,
            vec![("bucket-a", "user-1"), ("bucket-a", "user-2"), ("bucket-b", "user-1")]
        );
    }

    #[test]
    fn test_reset_then_drain_is_empty() {
        let aggregate = UsageAggregate::new();
        aggregate.add_usage_item("bucket-a", "user-1", &counters(json!({"x": 1})));
        aggregate.reset();
        assert!(aggregate.drain().is_empty());
        assert!(aggregate.is_empty());
    }

    #[test]
    fn test_drain_does_not_mutate() {
        let aggregate = UsageAggregate::new();
        aggregate.add_usage_item("bucket-a", "user-1", &counters(json!({"x": 1})));
        assert_eq!(aggregate.drain(), aggregate.drain());
        assert_eq!(aggregate.len(), 1);
    }

    #[test]
    fn test_concurrent_feeds_lose_nothing() {
        let aggregate = Arc::new(UsageAggregate::new());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let aggregate = Arc::clone(&aggregate);
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        aggregate.add_usage_item("shared", "user", &counters(json!({"n": 1})));
                        aggregate.add_usage_item(
                            &format!("bucket-{worker}"),
                            "user",
                            &counters(json!({"n": 1})),
                        );
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let shared = aggregate.get("shared", "user").unwrap();
        assert_eq!(shared.get("n").and_then(|v| v.as_i64()), Some(2000));
        assert_eq!(aggregate.len(), 9);
    }
}
