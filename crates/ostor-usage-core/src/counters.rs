//! Nested usage counters and their additive merge
//!
//! A usage object reports its counters as an arbitrarily nested JSON mapping,
//! typically grouped by storage class:
//!
//! ```json
//! { "STANDARD": { "bytes": 100, "objects": 3 }, "COLD": { "bytes": 10 } }
//! ```
//!
//! No schema is assumed beyond "leaves are numbers, inner nodes are maps".
//! Leaves that are not numbers are carried as [`CounterValue::Other`] so they
//! survive a round trip into the summary.
//!
//! # Merge policy
//!
//! [`merge_counters`] adds numeric leaves and recurses into subtrees. When the
//! two sides can't be added (a string meeting a number, a subtree meeting a
//! leaf) the destination is overwritten with the source value and the value
//! accumulated so far is lost. Tests pin this behaviour down.
//!
//! # Examples
//!
//! ```
//! use ostor_usage_core::counters::{CounterTree, merge_counters};
//! use serde_json::json;
//!
//! let mut total = CounterTree::from_json(json!({"STANDARD": {"bytes": 100}})).unwrap();
//! let more = CounterTree::from_json(json!({"STANDARD": {"bytes": 50}, "COLD": {"bytes": 10}})).unwrap();
//!
//! merge_counters(&mut total, &more);
//!
//! assert_eq!(total.get_path(&["STANDARD", "bytes"]).and_then(|v| v.as_i64()), Some(150));
//! assert_eq!(total.get_path(&["COLD", "bytes"]).and_then(|v| v.as_i64()), Some(10));
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single node of a counter tree
///
/// Deserialization tries the variants in order, so integral JSON numbers that
/// fit an `i64` become [`CounterValue::Int`], other numbers become
/// [`CounterValue::Float`], objects become [`CounterValue::Tree`] and
/// everything else lands in [`CounterValue::Other`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CounterValue {
    /// Integral counter
    Int(i64),
    /// Fractional (or out of `i64` range) counter
    Float(f64),
    /// Nested group of counters
    Tree(CounterTree),
    /// Non-numeric leaf (string, bool, null, array)
    Other(serde_json::Value),
}

impl CounterValue {
    /// Integer value of a leaf, if it is an integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CounterValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric value of a leaf as `f64`, if it is numeric
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CounterValue::Int(v) => Some(*v as f64),
            CounterValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Nested tree, if this node is one
    pub fn as_tree(&self) -> Option<&CounterTree> {
        match self {
            CounterValue::Tree(tree) => Some(tree),
            _ => None,
        }
    }

    /// Whether this node is a numeric leaf
    pub fn is_numeric(&self) -> bool {
        matches!(self, CounterValue::Int(_) | CounterValue::Float(_))
    }

    /// Add `source` onto `self`
    ///
    /// Integers stay integers unless the sum overflows, in which case it is
    /// promoted to a float. Any pairing that isn't two numbers yields the
    /// source value unchanged.
    fn added(&self, source: &CounterValue) -> CounterValue {
        match (self, source) {
            (CounterValue::Int(a), CounterValue::Int(b)) => a
                .checked_add(*b)
                .map(CounterValue::Int)
                .unwrap_or(CounterValue::Float(*a as f64 + *b as f64)),
            (CounterValue::Int(a), CounterValue::Float(b)) => CounterValue::Float(*a as f64 + b),
            (CounterValue::Float(a), CounterValue::Int(b)) => CounterValue::Float(a + *b as f64),
            (CounterValue::Float(a), CounterValue::Float(b)) => CounterValue::Float(a + b),
            _ => source.clone(),
        }
    }
}

/// Mapping from metric name to counter value
///
/// Keys are kept sorted so that serialized summaries are stable between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CounterTree(BTreeMap<String, CounterValue>);

impl CounterTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Build a tree from a JSON value
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is not a JSON object
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Number of direct children
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the tree has no children
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Look up a direct child
    pub fn get(&self, key: &str) -> Option<&CounterValue> {
        self.0.get(key)
    }

    /// Look up a node by its path of keys from the root
    pub fn get_path(&self, path: &[&str]) -> Option<&CounterValue> {
        let (last, parents) = path.split_last()?;
        let mut node = self;
        for key in parents {
            node = node.get(key)?.as_tree()?;
        }
        node.get(last)
    }

    /// Insert or replace a direct child
    pub fn insert(&mut self, key: impl Into<String>, value: CounterValue) -> Option<CounterValue> {
        self.0.insert(key.into(), value)
    }

    /// Names of the direct children, in key order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterate over direct children in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CounterValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merge `source` into this tree, see [`merge_counters`]
    pub fn merge(&mut self, source: &CounterTree) {
        merge_counters(self, source);
    }
}

impl FromIterator<(String, CounterValue)> for CounterTree {
    fn from_iter<I: IntoIterator<Item = (String, CounterValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Recursively merge `source` into `destination`
///
/// For every key of `source`:
/// - a subtree is merged into the matching destination subtree, which is
///   created when absent;
/// - a leaf is added to the destination leaf, which counts as zero when absent.
///
/// Values that can't be added overwrite the destination.
pub fn merge_counters(destination: &mut CounterTree, source: &CounterTree) {
    for (key, value) in &source.0 {
        match value {
            CounterValue::Tree(source_tree) => match destination.0.get_mut(key) {
                Some(CounterValue::Tree(node)) => merge_counters(node, source_tree),
                Some(existing) => *existing = value.clone(),
                None => {
                    destination.0.insert(key.clone(), value.clone());
                }
            },
            leaf => {
                let merged = match destination.0.get(key) {
                    Some(existing) => existing.added(leaf),
                    None => leaf.clone(),
                };
                destination.0.insert(key.clone(), merged);
            }
        }
    }
}
