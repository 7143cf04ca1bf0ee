//! Admission check for protected operations.

use std::{future::Future, sync::Arc, time::Duration};

use config::{FailureMode, GuardConfig, RateLimitQuota, StorageConfig};
use jiff::Timestamp;

use crate::{
    annotate::{Field, ResponseAnnotator},
    blacklist::BlacklistStore,
    counter::WindowedCounter,
    error::RateLimitError,
    request::RateLimitRequest,
    storage::{CounterStore, InMemoryStorage, RedisStorage, StorageError},
    threshold::{ThresholdEvaluator, Verdict},
    tracker::Tracker,
};

/// Outcome of an admitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Counted and within quota.
    Admitted {
        /// Count including this request.
        current: u64,
        /// Requests left in the window.
        remaining: u64,
    },
    /// Let through without counting: the guard is disabled, or the store
    /// failed and the guard fails open.
    Unchecked,
}

/// Per-request admission guard.
///
/// Holds no per-caller state of its own; all counts live in the injected
/// store, so any number of instances can share one.
#[derive(Clone)]
pub struct Guard {
    enabled: bool,
    counter: WindowedCounter,
    blacklist: BlacklistStore,
    failure_mode: FailureMode,
    store_timeout: Duration,
}

impl Guard {
    /// Build the configured storage backend and a guard on top of it.
    pub async fn from_config(config: &GuardConfig) -> Result<Self, RateLimitError> {
        let store: Arc<dyn CounterStore> = match &config.storage {
            StorageConfig::Memory => {
                log::debug!("Using in-memory counter storage, counts are not shared between instances");
                Arc::new(InMemoryStorage::new())
            }
            StorageConfig::Redis(redis_config) => Arc::new(RedisStorage::new(redis_config).await?),
        };

        Ok(Self::new(store, config))
    }

    /// Create a guard over an existing store.
    pub fn new(store: Arc<dyn CounterStore>, config: &GuardConfig) -> Self {
        Self {
            enabled: config.enabled,
            counter: WindowedCounter::new(store.clone()),
            blacklist: BlacklistStore::new(store),
            failure_mode: config.failure_mode,
            store_timeout: config.store_timeout,
        }
    }

    /// Whether requests are checked at all.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Run the admission check for one invocation of `operation`.
    ///
    /// The quota fields are written to `annotator` before any rejection is
    /// returned. A count above the limit is rejected before the blacklist is
    /// consulted, and a count above twice the limit blacklists the caller's
    /// address for two windows.
    pub async fn evaluate(
        &self,
        request: &RateLimitRequest,
        operation: &str,
        quota: &RateLimitQuota,
        annotator: &mut (dyn ResponseAnnotator + Send),
    ) -> Result<Admission, RateLimitError> {
        if !self.enabled {
            return Ok(Admission::Unchecked);
        }

        let tracker = Tracker::track(request);
        let evaluator = ThresholdEvaluator::new(quota);
        let window = evaluator.window();

        let current = match self.bounded(self.counter.hit(operation, &tracker, window)).await {
            Ok(current) => current,
            Err(err) => {
                self.store_failure(err, operation, &tracker)?;
                return Ok(Admission::Unchecked);
            }
        };

        let remaining = evaluator.remaining(current);

        annotator.annotate(Field::Limit, evaluator.limit().to_string());
        annotator.annotate(Field::Remaining, remaining.to_string());
        annotator.annotate(Field::Reset, reset_timestamp(window).to_string());

        let verdict = evaluator.classify(current);

        if verdict == Verdict::Escalated {
            self.escalate(&tracker, &evaluator, current).await;
        }

        if verdict != Verdict::WithinLimit {
            annotator.annotate(Field::RetryAfter, window.as_secs().to_string());

            log::debug!(
                "Rejecting {operation} for {tracker}: {current} requests against a limit of {}",
                evaluator.limit()
            );

            return Err(RateLimitError::RateLimitExceeded {
                limit: evaluator.limit(),
                current,
                retry_after: window,
            });
        }

        match self.bounded(self.blacklist.is_flagged(tracker.address())).await {
            Ok(true) => {
                log::debug!("Rejecting {operation} for {tracker}: address is blacklisted");

                return Err(RateLimitError::IdentityBlacklisted {
                    address: tracker.address().to_string(),
                });
            }
            Ok(false) => (),
            Err(err) => self.store_failure(err, operation, &tracker)?,
        }

        Ok(Admission::Admitted { current, remaining })
    }

    async fn escalate(&self, tracker: &Tracker, evaluator: &ThresholdEvaluator, current: u64) {
        let ttl = evaluator.blacklist_ttl();

        log::warn!(
            "Blacklisting {} for {ttl:?}: {tracker} reached {current} requests against a limit of {}",
            tracker.address(),
            evaluator.limit()
        );

        // The request is rejected either way, so a failed write only loses the escalation.
        if let Err(err) = self.bounded(self.blacklist.flag(tracker.address(), ttl)).await {
            log::error!("Failed to blacklist {}: {err}", tracker.address());
        }
    }

    fn store_failure(&self, err: StorageError, operation: &str, tracker: &Tracker) -> Result<(), RateLimitError> {
        match self.failure_mode {
            FailureMode::Open => {
                log::warn!("Counter store failed while checking {operation} for {tracker}, admitting: {err}");
                Ok(())
            }
            FailureMode::Closed => {
                log::warn!("Counter store failed while checking {operation} for {tracker}, rejecting: {err}");
                Err(RateLimitError::StoreUnavailable(err))
            }
        }
    }

    async fn bounded<T>(&self, operation: impl Future<Output = Result<T, StorageError>>) -> Result<T, StorageError> {
        match tokio::time::timeout(self.store_timeout, operation).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout(self.store_timeout)),
        }
    }
}

/// Unix timestamp, in seconds, one window from now.
fn reset_timestamp(window: Duration) -> i64 {
    let window = i64::try_from(window.as_secs()).unwrap_or(i64::MAX);
    Timestamp::now().as_second().saturating_add(window)
}
