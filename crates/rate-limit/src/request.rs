//! Request information needed to identify a caller.

/// What the guard needs to know about an inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitRequest {
    /// Candidate client addresses in order of preference, usually from `X-Forwarded-For`.
    pub forwarded_for: Vec<String>,
    /// Address of the directly connected peer, used when no candidate is known.
    pub peer_address: String,
    /// Authenticated principal id, if the caller is logged in.
    pub principal: Option<String>,
}

impl RateLimitRequest {
    /// Create a new builder for a rate limit request.
    pub fn builder() -> RateLimitRequestBuilder {
        RateLimitRequestBuilder::default()
    }
}

/// Builder for creating rate limit requests.
#[derive(Debug, Default)]
pub struct RateLimitRequestBuilder {
    forwarded_for: Vec<String>,
    peer_address: Option<String>,
    principal: Option<String>,
}

impl RateLimitRequestBuilder {
    /// Append a candidate address.
    pub fn forwarded(mut self, address: impl Into<String>) -> Self {
        self.forwarded_for.push(address.into());
        self
    }

    /// Parse a comma-separated `X-Forwarded-For` value, keeping the original order.
    pub fn forwarded_header(mut self, value: &str) -> Self {
        let candidates = value
            .split(',')
            .map(str::trim)
            .filter(|candidate| !candidate.is_empty())
            .map(ToString::to_string);

        self.forwarded_for.extend(candidates);
        self
    }

    /// Set the address of the directly connected peer.
    pub fn peer(mut self, address: impl Into<String>) -> Self {
        self.peer_address = Some(address.into());
        self
    }

    /// Set the authenticated principal id.
    pub fn principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    /// Build the rate limit request. A missing peer address becomes `unknown`.
    pub fn build(self) -> RateLimitRequest {
        RateLimitRequest {
            forwarded_for: self.forwarded_for,
            peer_address: self.peer_address.unwrap_or_else(|| "unknown".to_string()),
            principal: self.principal,
        }
    }
}
