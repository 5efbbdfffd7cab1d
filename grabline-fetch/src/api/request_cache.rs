//! Bounded request cache for API responses.
//!
//! Keys are exact query URLs. Eviction is FIFO by insertion: a hit does not
//! move an entry, and re-inserting an existing key keeps its original slot.

use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::trace;

/// Default number of cached responses.
pub const REQUEST_CACHE_CAPACITY: usize = 16;

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<String, Arc<Value>>,
    order: VecDeque<String>,
}

/// FIFO cache of successful API responses.
#[derive(Debug)]
pub struct RequestCache {
    capacity: usize,
    entries: Mutex<Entries>,
}

impl RequestCache {
    /// Creates a cache with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(REQUEST_CACHE_CAPACITY)
    }

    /// Creates a cache holding at most `capacity` responses (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(Entries::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cached response for `url`.
    pub fn get(&self, url: &str) -> Option<Arc<Value>> {
        self.lock().map.get(url).cloned()
    }

    /// Stores a response, evicting the oldest insertion when full.
    pub fn insert(&self, url: impl Into<String>, response: Arc<Value>) {
        let url = url.into();
        let mut entries = self.lock();

        if let Some(slot) = entries.map.get_mut(&url) {
            *slot = response;
            return;
        }

        while entries.order.len() >= self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                trace!(url = %oldest, "Evicting cached response");
                entries.map.remove(&oldest);
            }
        }

        entries.order.push_back(url.clone());
        entries.map.insert(url, response);
    }

    /// Number of cached responses.
    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of cached responses.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops every cached response.
    pub fn clear(&self) {
        let mut entries = self.lock();
        entries.map.clear();
        entries.order.clear();
    }
}

impl Default for RequestCache {
    fn default() -> Self {
        Self::new()
    }
}
