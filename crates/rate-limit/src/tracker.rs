//! Caller identity derivation.

use std::fmt;

use crate::request::RateLimitRequest;

/// Principal name used for callers without an authenticated id.
pub const ANONYMOUS: &str = "anonymous";

/// Identity of a rate-limited caller: a network address plus a principal.
///
/// Renders as `<address>:<principal>`. The address is kept apart so that
/// blacklisting never has to split the rendered string, which would break on
/// IPv6 addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tracker {
    address: String,
    principal: Option<String>,
}

impl Tracker {
    /// Derive the tracker for a request.
    ///
    /// The first forwarded address wins, the peer address is the fallback.
    pub fn track(request: &RateLimitRequest) -> Self {
        let address = request
            .forwarded_for
            .first()
            .unwrap_or(&request.peer_address)
            .clone();

        Self {
            address,
            principal: request.principal.clone(),
        }
    }

    /// The network address part, used as the blacklist key.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The principal part, `anonymous` when unauthenticated.
    pub fn principal(&self) -> &str {
        self.principal.as_deref().unwrap_or(ANONYMOUS)
    }
}

impl fmt::Display for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.principal())
    }
}
