//! Classification of a request count against a quota.

use std::time::Duration;

use config::RateLimitQuota;

/// Where a post-increment count sits relative to the limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// `1..=limit`: admitted, unless the address is blacklisted.
    WithinLimit,
    /// `limit + 1..=2 * limit`: rejected.
    OverLimit,
    /// Above `2 * limit`: rejected and the address gets blacklisted.
    Escalated,
}

/// Applies one quota to request counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdEvaluator {
    limit: u32,
    window: Duration,
}

impl ThresholdEvaluator {
    /// Evaluate counts against `quota`.
    pub fn new(quota: &RateLimitQuota) -> Self {
        Self {
            limit: quota.limit,
            window: quota.window,
        }
    }

    /// Configured limit.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Configured window, also the retry hint for rejected requests.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Classify a post-increment count.
    pub fn classify(&self, count: u64) -> Verdict {
        let limit = u64::from(self.limit);

        if count <= limit {
            Verdict::WithinLimit
        } else if count <= limit.saturating_mul(2) {
            Verdict::OverLimit
        } else {
            Verdict::Escalated
        }
    }

    /// Requests left in the window after `count`, never negative.
    pub fn remaining(&self, count: u64) -> u64 {
        u64::from(self.limit).saturating_sub(count)
    }

    /// How long an escalated address stays blacklisted.
    pub fn blacklist_ttl(&self) -> Duration {
        self.window.saturating_mul(2)
    }
}
