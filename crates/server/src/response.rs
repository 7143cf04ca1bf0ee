//! Rate-limit headers and rejection bodies.

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use rate_limit::{Field, RateLimitError, ResponseAnnotator};
use serde::Serialize;

/// Collects the guard's feedback fields as HTTP headers.
#[derive(Debug, Default)]
pub struct RateLimitHeaders(HeaderMap);

impl RateLimitHeaders {
    /// The collected headers.
    pub fn into_inner(self) -> HeaderMap {
        self.0
    }
}

impl ResponseAnnotator for RateLimitHeaders {
    fn annotate(&mut self, field: Field, value: String) {
        match HeaderValue::try_from(value) {
            Ok(value) => {
                self.0.insert(HeaderName::from_static(field.header_name()), value);
            }
            Err(e) => log::warn!("Dropping invalid {} header value: {e}", field.header_name()),
        }
    }
}

/// JSON body of a refused request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RejectionBody {
    status_code: u16,
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    current: Option<u64>,
}

impl RejectionBody {
    pub(crate) fn new(status: StatusCode, message: &'static str) -> Self {
        Self {
            status_code: status.as_u16(),
            message,
            retry_after: None,
            limit: None,
            current: None,
        }
    }

    pub(crate) fn from_error(err: &RateLimitError) -> Self {
        match err {
            RateLimitError::RateLimitExceeded {
                limit,
                current,
                retry_after,
            } => Self {
                retry_after: Some(retry_after.as_secs()),
                limit: Some(*limit),
                current: Some(*current),
                ..Self::new(StatusCode::TOO_MANY_REQUESTS, "Too many requests")
            },
            RateLimitError::IdentityBlacklisted { .. } => Self::new(StatusCode::FORBIDDEN, "Access denied"),
            RateLimitError::StoreUnavailable(_) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "Rate limiting is temporarily unavailable",
            ),
        }
    }

    pub(crate) fn into_response_with(self, headers: HeaderMap) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, headers, Json(self)).into_response()
    }
}

/// Response for a refused request, carrying the quota headers written before the refusal.
pub(crate) fn rejection_response(err: &RateLimitError, headers: RateLimitHeaders) -> Response {
    RejectionBody::from_error(err).into_response_with(headers.into_inner())
}
