//! Shared test utilities for unit tests
//!
//! Integration tests (in tests/) cannot access this module because it's
//! marked with #[cfg(test)]. They have their own helpers in tests/common/mod.rs.

use crate::counters::CounterTree;
use crate::types::ObjectName;

/// Build a counter tree from a `json!` literal
pub fn counters(value: serde_json::Value) -> CounterTree {
    CounterTree::from_json(value).expect("test counters must be a JSON object")
}

/// Object names for a list of string literals
pub fn names(raw: &[&str]) -> Vec<ObjectName> {
    raw.iter().map(|name| ObjectName::new(*name)).collect()
}
