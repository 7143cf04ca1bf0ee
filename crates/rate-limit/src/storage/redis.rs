//! Redis-backed counter storage shared by every service instance.

use std::time::Duration;

use async_trait::async_trait;
use deadpool::managed::Object;
use redis::AsyncCommands;

use super::redis_pool::{self, Manager, Pool};
use super::{CounterStore, StorageError};
use config::RedisConfig;

/// Redis-based counter storage.
pub struct RedisStorage {
    pool: Pool,
    key_prefix: String,
}

impl RedisStorage {
    /// Create the pool and verify the server answers.
    pub async fn new(config: &RedisConfig) -> Result<Self, StorageError> {
        let storage = Self::lazy(config)?;

        let mut conn = storage.connection().await?;

        let _: String = redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|e| StorageError::Connection(format!("Failed to ping Redis server: {e}")))?;

        log::debug!("Connected to Redis counter store at {}", config.url);

        Ok(storage)
    }

    /// Create the pool without connecting.
    pub fn lazy(config: &RedisConfig) -> Result<Self, StorageError> {
        let pool = redis_pool::create_pool(config)
            .map_err(|e| StorageError::Connection(format!("Failed to create Redis connection pool: {e}")))?;

        Ok(Self {
            pool,
            key_prefix: config.key_prefix.clone(),
        })
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{key}", self.key_prefix)
    }

    async fn connection(&self) -> Result<Object<Manager>, StorageError> {
        self.pool
            .get()
            .await
            .map_err(|e| StorageError::Connection(format!("Failed to get Redis connection from pool: {e}")))
    }
}

fn ttl_millis(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX).max(1)
}

#[async_trait]
impl CounterStore for RedisStorage {
    async fn get(&self, key: &str) -> Result<Option<u64>, StorageError> {
        let mut conn = self.connection().await?;

        conn.get(self.prefixed(key))
            .await
            .map_err(|e| StorageError::Query(e.to_string()))
    }

    async fn set(&self, key: &str, value: u64, ttl: Duration) -> Result<(), StorageError> {
        let mut conn = self.connection().await?;

        redis::cmd("SET")
            .arg(self.prefixed(key))
            .arg(value)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async::<()>(&mut *conn)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))
    }

    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, StorageError> {
        let key = self.prefixed(key);
        let mut conn = self.connection().await?;

        // MULTI/EXEC: the increment and the expiry refresh land together.
        let (value,): (u64,) = redis::pipe()
            .atomic()
            .incr(&key, 1)
            .pexpire(&key, ttl_millis(ttl))
            .ignore()
            .query_async(&mut *conn)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(value)
    }
}
