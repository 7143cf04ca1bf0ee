//! Admission middleware for HTTP routes.

use std::{
    fmt::Display,
    future::Future,
    net::SocketAddr,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{body::Body, extract::ConnectInfo};
use config::RateLimitQuota;
use http::{HeaderName, Request, Response};
use rate_limit::{Guard, RateLimitRequest};
use tower::Layer;

use crate::response::{RateLimitHeaders, rejection_response};

/// Authenticated principal id, inserted into request extensions by an upstream auth layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal(pub String);

/// Tower layer running the admission guard for one protected operation.
#[derive(Clone)]
pub struct GuardLayer {
    guard: Arc<Guard>,
    operation: Arc<str>,
    quota: RateLimitQuota,
    principal_header: Option<HeaderName>,
}

impl GuardLayer {
    /// Guard the wrapped routes as `operation` with the given quota.
    pub fn new(guard: Arc<Guard>, operation: impl Into<Arc<str>>, quota: RateLimitQuota) -> Self {
        Self {
            guard,
            operation: operation.into(),
            quota,
            principal_header: None,
        }
    }

    /// Trust this header for the principal id when no [`Principal`] extension is present.
    pub fn principal_header(mut self, name: HeaderName) -> Self {
        self.principal_header = Some(name);
        self
    }
}

impl<Service> Layer<Service> for GuardLayer
where
    Service: Send + Clone,
{
    type Service = GuardService<Service>;

    fn layer(&self, next: Service) -> Self::Service {
        GuardService {
            next,
            layer: self.clone(),
        }
    }
}

/// Service produced by [`GuardLayer`].
#[derive(Clone)]
pub struct GuardService<Service> {
    next: Service,
    layer: GuardLayer,
}

impl<Service, ReqBody> tower::Service<Request<ReqBody>> for GuardService<Service>
where
    Service: tower::Service<Request<ReqBody>, Response = Response<Body>> + Send + Clone + 'static,
    Service::Future: Send,
    Service::Error: Display + 'static,
    ReqBody: http_body::Body + Send + 'static,
{
    type Response = http::Response<Body>;
    type Error = Service::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response<Body>, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.next.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let mut next = self.next.clone();
        let layer = self.layer.clone();

        Box::pin(async move {
            let request = rate_limit_request(&req, layer.principal_header.as_ref());
            let mut headers = RateLimitHeaders::default();

            let result = layer
                .guard
                .evaluate(&request, &layer.operation, &layer.quota, &mut headers)
                .await;

            if let Err(err) = result {
                log::debug!("Request to {} rejected: {err}", layer.operation);
                return Ok(rejection_response(&err, headers));
            }

            let mut response = next.call(req).await?;
            response.headers_mut().extend(headers.into_inner());

            Ok(response)
        })
    }
}

/// Describe the caller of an HTTP request for the guard.
///
/// Candidate addresses come from every `X-Forwarded-For` header in order, the
/// peer address from the connection. The principal is taken from the
/// [`Principal`] extension, then from the trusted header if one is configured.
pub(crate) fn rate_limit_request<B>(req: &Request<B>, principal_header: Option<&HeaderName>) -> RateLimitRequest {
    let mut builder = RateLimitRequest::builder();

    for value in req.headers().get_all("x-forwarded-for") {
        match value.to_str() {
            Ok(value) => builder = builder.forwarded_header(value),
            Err(_) => log::debug!("Ignoring non-ASCII X-Forwarded-For header"),
        }
    }

    if let Some(ConnectInfo(address)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        builder = builder.peer(address.ip().to_string());
    }

    let principal = req
        .extensions()
        .get::<Principal>()
        .map(|principal| principal.0.clone())
        .or_else(|| {
            let value = req.headers().get(principal_header?)?.to_str().ok()?.trim();
            (!value.is_empty()).then(|| value.to_string())
        });

    if let Some(principal) = principal {
        builder = builder.principal(principal);
    }

    builder.build()
}
