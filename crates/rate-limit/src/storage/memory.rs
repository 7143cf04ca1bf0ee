//! In-memory counter storage.
//!
//! Counts are local to the process, so this backend only gives correct
//! results for a single instance. It backs tests and local development.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;

use super::{CounterStore, StorageError};

/// Expired entries are swept after this many writes.
const SWEEP_INTERVAL: usize = 1024;

#[derive(Debug, Clone, Copy)]
struct Counter {
    value: u64,
    expires_at: Instant,
}

impl Counter {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// In-memory rate limit storage implementation.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    counters: DashMap<String, Counter>,
    writes: AtomicUsize,
}

impl InMemoryStorage {
    /// Create a new in-memory storage instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not swept yet.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Whether the store holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.counters.retain(|_, counter| counter.is_live(now));
    }

    fn after_write(&self) {
        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;

        if writes.is_multiple_of(SWEEP_INTERVAL) {
            log::debug!("Sweeping expired in-memory counters after {writes} writes");
            self.purge_expired();
        }
    }
}

#[async_trait]
impl CounterStore for InMemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<u64>, StorageError> {
        let now = Instant::now();

        let value = self
            .counters
            .get(key)
            .filter(|counter| counter.is_live(now))
            .map(|counter| counter.value);

        if value.is_none() {
            self.counters.remove_if(key, |_, counter| !counter.is_live(now));
        }

        Ok(value)
    }

    async fn set(&self, key: &str, value: u64, ttl: Duration) -> Result<(), StorageError> {
        let expires_at = Instant::now() + ttl;
        self.counters.insert(key.to_string(), Counter { value, expires_at });
        self.after_write();

        Ok(())
    }

    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, StorageError> {
        let now = Instant::now();
        let expires_at = now + ttl;

        // The entry holds the shard lock, so read and write happen as one step.
        let value = match self.counters.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                let counter = entry.get_mut();

                counter.value = if counter.is_live(now) {
                    counter.value.saturating_add(1)
                } else {
                    1
                };
                counter.expires_at = expires_at;

                counter.value
            }
            Entry::Vacant(entry) => {
                entry.insert(Counter { value: 1, expires_at });
                1
            }
        };

        self.after_write();

        Ok(value)
    }
}
