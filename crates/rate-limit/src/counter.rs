//! Per-identity, per-operation request counters.

use std::{sync::Arc, time::Duration};

use crate::{
    storage::{CounterStore, StorageError},
    tracker::Tracker,
};

/// Counts requests of one tracker against one operation inside a refreshing window.
#[derive(Clone)]
pub struct WindowedCounter {
    store: Arc<dyn CounterStore>,
}

impl WindowedCounter {
    /// Count against the given shared store.
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Deterministic store key for an operation, tracker and window length.
    pub fn key(operation: &str, tracker: &Tracker, window: Duration) -> String {
        format!("throttle:{operation}:{tracker}:{}", window.as_secs())
    }

    /// Record one request and return the count including it.
    ///
    /// The window's time-to-live is rewritten on every hit, so a caller that
    /// keeps sending requests keeps its counter alive.
    pub async fn hit(&self, operation: &str, tracker: &Tracker, window: Duration) -> Result<u64, StorageError> {
        let key = Self::key(operation, tracker, window);
        let count = self.store.increment(&key, window).await?;

        log::debug!("Counter {key} is now {count}");

        Ok(count)
    }
}
