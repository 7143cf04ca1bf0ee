//! Rate-limit feedback written onto responses.

use std::collections::BTreeMap;

/// A rate-limit feedback field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    /// The configured limit.
    Limit,
    /// Requests left in the current window.
    Remaining,
    /// Unix timestamp, in seconds, at which the window runs out if left idle.
    Reset,
    /// Seconds to wait before retrying. Only set on rejection.
    RetryAfter,
}

impl Field {
    /// HTTP header carrying the field.
    pub fn header_name(self) -> &'static str {
        match self {
            Field::Limit => "x-ratelimit-limit",
            Field::Remaining => "x-ratelimit-remaining",
            Field::Reset => "x-ratelimit-reset",
            Field::RetryAfter => "retry-after",
        }
    }
}

/// Sink for rate-limit feedback on the outgoing response.
///
/// The guard writes every field before it returns a rejection, so callers
/// see the quota state on refused requests too.
pub trait ResponseAnnotator {
    /// Set a field, replacing any earlier value.
    fn annotate(&mut self, field: Field, value: String);
}

/// Annotations collected in memory, for transports that apply them later.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotations(BTreeMap<Field, String>);

impl Annotations {
    /// Value of a field, if it was set.
    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    /// All fields set so far.
    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.0.iter().map(|(field, value)| (*field, value.as_str()))
    }

    /// Whether nothing was set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl ResponseAnnotator for Annotations {
    fn annotate(&mut self, field: Field, value: String) {
        self.0.insert(field, value);
    }
}
