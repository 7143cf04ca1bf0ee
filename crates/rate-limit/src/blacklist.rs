//! Address-level blacklist kept in the counter store.

use std::{sync::Arc, time::Duration};

use crate::storage::{CounterStore, StorageError};

/// Flags network addresses for sustained abuse.
///
/// Entries are never removed explicitly; they disappear when their
/// time-to-live runs out.
#[derive(Clone)]
pub struct BlacklistStore {
    store: Arc<dyn CounterStore>,
}

impl BlacklistStore {
    /// Keep the blacklist in the given shared store.
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Store key for an address.
    pub fn key(address: &str) -> String {
        format!("blacklist:{address}")
    }

    /// Whether the address is currently flagged.
    pub async fn is_flagged(&self, address: &str) -> Result<bool, StorageError> {
        Ok(self.store.get(&Self::key(address)).await?.is_some())
    }

    /// Flag the address for `ttl`, replacing any existing entry.
    pub async fn flag(&self, address: &str, ttl: Duration) -> Result<(), StorageError> {
        self.store.set(&Self::key(address), 1, ttl).await
    }
}
