//! Admission guard configuration: quotas per operation, storage and failure policy.

use std::{collections::BTreeMap, time::Duration};

use duration_str::{deserialize_duration, deserialize_option_duration};
use serde::Deserialize;

/// Configuration of the admission guard.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GuardConfig {
    /// Whether the guard runs at all. A disabled guard admits everything.
    pub enabled: bool,
    /// What to do when the counter store cannot be reached.
    pub failure_mode: FailureMode,
    /// Upper bound for a single round trip to the counter store.
    #[serde(deserialize_with = "deserialize_duration")]
    pub store_timeout: Duration,
    /// Trusted header carrying the authenticated principal id, set by an upstream proxy.
    pub principal_header: Option<String>,
    /// Counter store backend.
    pub storage: StorageConfig,
    /// Quota used for operations without an entry in `operations`.
    pub default: Option<RateLimitQuota>,
    /// Quotas keyed by protected operation name.
    pub operations: BTreeMap<String, RateLimitQuota>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_mode: FailureMode::default(),
            store_timeout: Duration::from_secs(1),
            principal_header: None,
            storage: StorageConfig::default(),
            default: None,
            operations: BTreeMap::new(),
        }
    }
}

impl GuardConfig {
    /// Resolve the quota for an operation, falling back to the default quota.
    pub fn quota_for(&self, operation: &str) -> Option<&RateLimitQuota> {
        self.operations.get(operation).or(self.default.as_ref())
    }
}

/// Behavior of the guard when its counter store fails or times out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    /// Admit the request and log the fault. Abuse protection is off until the store recovers.
    #[default]
    Open,
    /// Reject the request. Protection is kept, availability is not.
    Closed,
}

/// Limit and window of a protected operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitQuota {
    /// Maximum number of requests admitted within one window.
    pub limit: u32,
    /// Window length. Every request refreshes the window.
    #[serde(deserialize_with = "deserialize_duration")]
    pub window: Duration,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Process-local storage. Only correct for a single instance.
    #[default]
    Memory,
    /// Redis shared by every instance.
    Redis(Box<RedisConfig>),
}

/// Redis storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedisConfig {
    /// Redis connection URL (redis:// or rediss:// for TLS).
    pub url: String,
    /// Connection pool configuration.
    #[serde(default)]
    pub pool: RedisPoolConfig,
    /// TLS configuration.
    pub tls: Option<RedisTlsConfig>,
    /// Prefix for every key written by the guard.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_key_prefix() -> String {
    "turnstile:".to_string()
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379/0".to_string(),
            pool: RedisPoolConfig::default(),
            tls: None,
            key_prefix: default_key_prefix(),
        }
    }
}

/// Redis connection pool configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedisPoolConfig {
    /// Maximum number of connections.
    pub max_size: Option<usize>,
    /// Timeout for creating connections.
    #[serde(default, deserialize_with = "deserialize_option_duration")]
    pub timeout_create: Option<Duration>,
    /// Timeout for waiting for a connection.
    #[serde(default, deserialize_with = "deserialize_option_duration")]
    pub timeout_wait: Option<Duration>,
    /// Timeout for recycling a connection.
    #[serde(default, deserialize_with = "deserialize_option_duration")]
    pub timeout_recycle: Option<Duration>,
}

impl Default for RedisPoolConfig {
    fn default() -> Self {
        Self {
            max_size: Some(16),
            timeout_create: Some(Duration::from_secs(5)),
            timeout_wait: Some(Duration::from_secs(5)),
            timeout_recycle: Some(Duration::from_secs(300)),
        }
    }
}

/// Redis TLS configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedisTlsConfig {
    /// Skip server certificate validation.
    pub insecure: Option<bool>,
    /// Path to CA certificate file.
    pub ca_cert_path: Option<String>,
    /// Path to client certificate file (for mutual TLS).
    pub client_cert_path: Option<String>,
    /// Path to client key file (for mutual TLS).
    pub client_key_path: Option<String>,
}
