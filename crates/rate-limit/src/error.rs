//! Error types for rate limiting.

use crate::storage::StorageError;
use std::time::Duration;

/// Reasons an admission check refuses a request.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// The caller used up its quota for the current window.
    #[error("Rate limit exceeded: {current} requests against a limit of {limit}")]
    RateLimitExceeded {
        /// Configured limit.
        limit: u32,
        /// Count after this request.
        current: u64,
        /// Time to wait before retrying.
        retry_after: Duration,
    },

    /// The caller's network address is blacklisted.
    #[error("Address {address} is blacklisted")]
    IdentityBlacklisted {
        /// The flagged address.
        address: String,
    },

    /// The counter store could not be used and the guard fails closed.
    #[error("Counter store unavailable: {0}")]
    StoreUnavailable(#[from] StorageError),
}

impl RateLimitError {
    /// Get the retry-after duration if available.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimitExceeded { retry_after, .. } => Some(*retry_after),
            Self::IdentityBlacklisted { .. } | Self::StoreUnavailable(_) => None,
        }
    }
}
