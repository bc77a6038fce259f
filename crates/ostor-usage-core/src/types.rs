//! Core domain types for ostor-usage
//!
//! Strongly-typed wrappers for usage object names and aggregate keys, the
//! documents exchanged with the admin API, and the summary a run produces.

use crate::counters::CounterTree;
use crate::error::{Result, UsageError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// Name of a usage statistics object on the remote store
///
/// Names embed the UTC timestamp the object was cut at, e.g.
/// `s3-usage-2024-01-01T00:00:00.000Z`.
///
/// # Examples
/// ```
/// use ostor_usage_core::types::ObjectName;
///
/// let name = ObjectName::new("s3-usage-2024-01-01T00:00:00Z");
/// assert_eq!(name.as_str(), "s3-usage-2024-01-01T00:00:00Z");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectName(String);

impl ObjectName {
    /// Create a new ObjectName
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ObjectName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identity of one summary row: a bucket and the user that owns the usage
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AggregateKey {
    /// Bucket name
    pub bucket: String,
    /// Owner user id
    pub user_id: String,
}

impl AggregateKey {
    /// Create a new AggregateKey
    pub fn new(bucket: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            user_id: user_id.into(),
        }
    }
}

impl fmt::Display for AggregateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.user_id)
    }
}

/// Response of the usage listing call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageListing {
    /// Names of all pending usage objects
    #[serde(default)]
    pub items: Vec<ObjectName>,
}

/// One valid usage record pulled out of a usage object document
#[derive(Debug, Clone, PartialEq)]
pub struct UsageItem {
    /// Bucket the counters belong to
    pub bucket: String,
    /// User owning the bucket
    pub user_id: String,
    /// Counters reported for this bucket and user
    pub counters: CounterTree,
}

impl UsageItem {
    /// Extract every valid usage item from a fetched usage object document
    ///
    /// The document looks like
    /// `{"items": [{"key": {"bucket": .., "user_id": ..}, "counters": {..}}]}`.
    /// A missing or null `items` list yields no items. Items without a
    /// non-empty bucket, user id or counter mapping are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::MalformedDocument`] if the document is not a JSON
    /// object or its `items` field is not a list.
    pub fn extract_all(object: &ObjectName, document: &Value) -> Result<Vec<UsageItem>> {
        let fields = document
            .as_object()
            .ok_or_else(|| UsageError::MalformedDocument {
                object: object.to_string(),
                reason: "document is not a JSON object".to_string(),
            })?;

        let items = match fields.get("items") {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(UsageError::MalformedDocument {
                    object: object.to_string(),
                    reason: "`items` is not a list".to_string(),
                });
            }
        };

        let mut extracted = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            match Self::from_item(item) {
                Some(usage_item) => extracted.push(usage_item),
                None => debug!("Skipping item {} of {}: missing bucket, user or counters", index, object),
            }
        }
        Ok(extracted)
    }

    fn from_item(item: &Value) -> Option<UsageItem> {
        let key = item.get("key")?;
        let bucket = non_empty_str(key.get("bucket")?)?;
        let user_id = non_empty_str(key.get("user_id")?)?;

        let counters = item.get("counters")?;
        if counters.as_object()?.is_empty() {
            return None;
        }
        let counters = CounterTree::from_json(counters.clone()).ok()?;

        Some(UsageItem {
            bucket: bucket.to_string(),
            user_id: user_id.to_string(),
            counters,
        })
    }

    /// The aggregate key this item contributes to
    pub fn key(&self) -> AggregateKey {
        AggregateKey::new(&self.bucket, &self.user_id)
    }
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.is_empty())
}

/// Wrapper matching the `{"counters": {...}}` shape of a summary row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountersEnvelope {
    /// Aggregated counters
    pub counters: CounterTree,
}

/// One row of the usage summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRow {
    /// Bucket name
    pub bucket: String,
    /// Owner user id
    pub user_id: String,
    /// Aggregated counters
    pub counters: CountersEnvelope,
}

impl UsageRow {
    /// Create a row for an aggregate key
    pub fn new(key: AggregateKey, counters: CounterTree) -> Self {
        Self {
            bucket: key.bucket,
            user_id: key.user_id,
            counters: CountersEnvelope { counters },
        }
    }
}

/// Outcome of a collection run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryStatus {
    /// Ready objects were fetched and aggregated
    Done,
    /// Nothing was ready to process
    Skip,
    /// The run could not list usage objects
    Error,
}

impl SummaryStatus {
    /// Status for a run that attempted `processed_requests` objects
    ///
    /// An error always wins, regardless of how much was processed.
    pub fn decide(processed_requests: usize, errored: bool) -> Self {
        if errored {
            SummaryStatus::Error
        } else if processed_requests == 0 {
            SummaryStatus::Skip
        } else {
            SummaryStatus::Done
        }
    }
}

impl fmt::Display for SummaryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryStatus::Done => write!(f, "done"),
            SummaryStatus::Skip => write!(f, "skip"),
            SummaryStatus::Error => write!(f, "error"),
        }
    }
}

/// The report a run produces and persists
///
/// # Examples
/// ```
/// use ostor_usage_core::types::{SummaryStatus, UsageSummary};
///
/// let summary = UsageSummary::assemble(0, 0, false, Vec::new());
/// assert_eq!(summary.status, SummaryStatus::Skip);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    /// Run outcome
    pub status: SummaryStatus,
    /// Number of usage objects listed
    pub received_items: usize,
    /// Number of usage objects selected as ready and attempted
    pub processed_requests: usize,
    /// One row per bucket and user
    pub summarized_data: Vec<UsageRow>,
}

impl UsageSummary {
    /// Assemble a summary, deciding its status
    ///
    /// A skipped run never carries rows.
    pub fn assemble(
        received_items: usize,
        processed_requests: usize,
        errored: bool,
        rows: Vec<UsageRow>,
    ) -> Self {
        let status = SummaryStatus::decide(processed_requests, errored);
        let summarized_data = match status {
            SummaryStatus::Skip => Vec::new(),
            SummaryStatus::Done | SummaryStatus::Error => rows,
        };

        Self {
            status,
            received_items,
            processed_requests,
            summarized_data,
        }
    }
}
