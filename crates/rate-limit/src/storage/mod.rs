//! Shared counter stores.

use std::time::Duration;

use async_trait::async_trait;

pub mod memory;
pub mod redis;
mod redis_pool;

pub use self::memory::InMemoryStorage;
pub use self::redis::RedisStorage;

/// Key-value store holding integer counters with a time-to-live.
///
/// Every instance of the service must see the same store for the counts to
/// be global. [`InMemoryStorage`] only satisfies this for a single process.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Read a counter. Absent and expired keys read as `None`.
    async fn get(&self, key: &str) -> Result<Option<u64>, StorageError>;

    /// Write a counter, replacing the value and the time-to-live.
    async fn set(&self, key: &str, value: u64, ttl: Duration) -> Result<(), StorageError>;

    /// Add one to a counter, refresh its time-to-live and return the new value.
    ///
    /// The default reads then writes, so concurrent callers can lose updates
    /// and under-count. Backends with an atomic increment-with-expiry
    /// primitive override it.
    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, StorageError> {
        let current = self.get(key).await?.unwrap_or(0);
        let next = current.saturating_add(1);

        self.set(key, next, ttl).await?;

        Ok(next)
    }
}

/// Errors that can occur in storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Connection to the backend failed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A command was rejected or failed.
    #[error("Query error: {0}")]
    Query(String),

    /// The backend did not answer in time.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Internal storage error.
    #[error("Storage error: {0}")]
    Internal(String),
}
