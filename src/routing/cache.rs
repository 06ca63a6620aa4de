//! Process-wide memory of which backend serves which route.

use std::sync::Arc;

use dashmap::DashMap;

use crate::observability::metrics;
use crate::routing::{Backend, RouteKey};

/// A thread-safe map of route key to the backend known to serve it.
///
/// Cloning is cheap and every clone shares the same entries. Upserts on
/// different keys never contend on the same shard lock, and an upsert on
/// a key is never lost, but a lookup racing a record on the same key may
/// observe the older value. That only costs an extra probe of A.
#[derive(Debug, Clone, Default)]
pub struct RouteCache {
    inner: Arc<DashMap<RouteKey, Backend>>,
}

impl RouteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend previously recorded for `key`, if any.
    pub fn lookup(&self, key: &RouteKey) -> Option<Backend> {
        self.inner.get(key).map(|entry| *entry.value())
    }

    /// Remember `backend` for `key`. Last writer wins.
    ///
    /// Returns the backend previously recorded for `key`.
    pub fn record(&self, key: RouteKey, backend: Backend) -> Option<Backend> {
        let previous = self.inner.insert(key.clone(), backend);
        match previous {
            None => {
                tracing::debug!(route = %key, backend = %backend, "Route cached");
                metrics::record_cache_insert();
            }
            Some(old) if old != backend => {
                tracing::debug!(route = %key, from = %old, to = %backend, "Cached route moved");
            }
            Some(_) => {}
        }
        previous
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Forget every decision. Subsequent requests probe A again.
    pub fn clear(&self) {
        self.inner.clear();
        metrics::reset_cache_size();
    }
}
