//! Per-run cache of raw fetched usage documents
//!
//! Holds each fetched document until it has been written out as a chunk.
//! A successful chunk write evicts the entry; the cache is dropped with the
//! run that owns it.

use crate::error::Result;
use crate::persist::DocumentStore;
use crate::types::ObjectName;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Raw usage documents keyed by object name
#[derive(Debug, Default)]
pub struct RawObjectCache {
    entries: Mutex<HashMap<ObjectName, Arc<Value>>>,
}

impl RawObjectCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ObjectName, Arc<Value>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remember the raw document fetched for `object`
    pub fn insert(&self, object: ObjectName, document: Value) {
        debug!("Added raw stats for object '{}'", object);
        self.lock().insert(object, Arc::new(document));
    }

    /// Raw document cached for `object`
    pub fn get(&self, object: &ObjectName) -> Option<Arc<Value>> {
        self.lock().get(object).cloned()
    }

    /// Drop the entry for `object`
    pub fn evict(&self, object: &ObjectName) -> Option<Arc<Value>> {
        self.lock().remove(object)
    }

    /// Number of cached documents
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Write the cached document of `object` as a chunk and evict it
    ///
    /// Returns `Ok(None)` when nothing is cached for the object. The entry is
    /// kept if the write fails.
    pub async fn persist_chunk(&self, object: &ObjectName, store: &DocumentStore) -> Result<Option<PathBuf>> {
        let Some(document) = self.get(object) else {
            warn!("No stats data for object '{}' to save", object);
            return Ok(None);
        };

        let path = store.save_chunk(object, &document).await?;
        self.evict(object);
        Ok(Some(path))
    }
}
