//! Admission endpoint: lets other services ask whether a caller may invoke an operation.
//!
//! The calling service forwards its client's `X-Forwarded-For` chain and the
//! trusted principal header; the answer is a bare status plus the quota headers.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Request, State},
    response::{IntoResponse, Response},
    routing::get,
};
use config::GuardConfig;
use http::{HeaderName, StatusCode};
use rate_limit::Guard;

use crate::{
    rate_limit::rate_limit_request,
    response::{RateLimitHeaders, RejectionBody, rejection_response},
};

#[derive(Clone)]
struct AdmissionState {
    guard: Arc<Guard>,
    config: Arc<GuardConfig>,
    principal_header: Option<HeaderName>,
}

/// Router exposing `GET|POST /admission/{operation}`.
pub(crate) fn router(guard: Arc<Guard>, config: GuardConfig) -> anyhow::Result<Router> {
    let principal_header = config
        .principal_header
        .as_deref()
        .map(|name| HeaderName::try_from(name.trim()))
        .transpose()
        .map_err(|e| anyhow::anyhow!("Invalid guard.principal_header: {e}"))?;

    let state = AdmissionState {
        guard,
        config: Arc::new(config),
        principal_header,
    };

    Ok(Router::new()
        .route("/admission/{operation}", get(admit).post(admit))
        .with_state(state))
}

async fn admit(State(state): State<AdmissionState>, Path(operation): Path<String>, req: Request) -> Response {
    let Some(quota) = state.config.quota_for(&operation) else {
        log::debug!("Admission requested for unknown operation {operation}");
        return RejectionBody::new(StatusCode::NOT_FOUND, "Unknown operation").into_response_with(Default::default());
    };

    let request = rate_limit_request(&req, state.principal_header.as_ref());
    let mut headers = RateLimitHeaders::default();

    match state.guard.evaluate(&request, &operation, quota, &mut headers).await {
        Ok(_) => (StatusCode::NO_CONTENT, headers.into_inner()).into_response(),
        Err(err) => {
            log::debug!("Admission for {operation} refused: {err}");
            rejection_response(&err, headers)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use config::RateLimitQuota;
    use rate_limit::InMemoryStorage;
    use tower::ServiceExt;

    use super::*;

    fn app() -> Router {
        let mut config = GuardConfig {
            principal_header: Some("x-user-id".to_string()),
            ..Default::default()
        };

        config.operations.insert(
            "createDebate".to_string(),
            RateLimitQuota {
                limit: 1,
                window: Duration::from_secs(60),
            },
        );

        let guard = Arc::new(Guard::new(Arc::new(InMemoryStorage::new()), &config));

        router(guard, config).unwrap()
    }

    fn admission(operation: &str, user: &str) -> Request {
        Request::post(format!("/admission/{operation}"))
            .header("x-forwarded-for", "1.1.1.1")
            .header("x-user-id", user)
            .body(Body::empty())
            .unwrap()
    }

    async fn body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn admits_then_refuses() {
        let app = app();

        let response = app.clone().oneshot(admission("createDebate", "userA")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()["x-ratelimit-remaining"], "0");

        let response = app.oneshot(admission("createDebate", "userA")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "60");

        insta::assert_json_snapshot!(body(response).await, @r#"
        {
          "current": 2,
          "limit": 1,
          "message": "Too many requests",
          "retryAfter": 60,
          "statusCode": 429
        }
        "#);
    }

    #[tokio::test]
    async fn unknown_operation() {
        let response = app().oneshot(admission("deleteEverything", "userA")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        insta::assert_json_snapshot!(body(response).await, @r#"
        {
          "message": "Unknown operation",
          "statusCode": 404
        }
        "#);
    }

    #[test]
    fn invalid_principal_header_is_rejected() {
        let config = GuardConfig {
            principal_header: Some("not a header".to_string()),
            ..Default::default()
        };

        let guard = Arc::new(Guard::new(Arc::new(InMemoryStorage::new()), &config));

        assert!(router(guard, config).is_err());
    }
}
