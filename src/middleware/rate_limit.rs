//! Request-rate limiting, implemented as a Tower Layer/Service (consistent
//! with [`super::metrics::ObservabilityLayer`]) delegating the actual sliding
//! window to [`crate::cache::CacheOperations::increment_rate_counter`] so
//! tests can exercise it uniformly against `NoOpCacheManager`.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};

use crate::cache::CacheOperations;
use crate::config::RateLimitConfig;

#[derive(Clone)]
pub struct RateLimitState {
    config: Arc<RateLimitConfig>,
    cache: Arc<dyn CacheOperations>,
}

impl RateLimitState {
    pub fn new(config: RateLimitConfig, cache: Arc<dyn CacheOperations>) -> Self {
        Self { config: Arc::new(config), cache }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn rule_for(&self, path: &str) -> (u64, u64) {
        self.config
            .endpoints
            .get(path)
            .map(|r| (r.requests, r.window_secs))
            .unwrap_or((self.config.default_requests, self.config.default_window_secs))
    }

    fn tenant_multiplier(&self, tenant_id: Option<&str>) -> f64 {
        tenant_id
            .and_then(|t| self.config.tenant_multipliers.get(t))
            .copied()
            .unwrap_or(1.0)
    }
}

#[derive(Clone)]
pub struct RateLimitLayer {
    state: RateLimitState,
}

impl RateLimitLayer {
    pub fn new(state: RateLimitState) -> Self {
        Self { state }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitMiddleware { inner, state: self.state.clone() }
    }
}

#[derive(Clone)]
pub struct RateLimitMiddleware<S> {
    inner: S,
    state: RateLimitState,
}

impl<S> Service<Request<Body>> for RateLimitMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        if !self.state.is_enabled() {
            let mut inner = self.inner.clone();
            return Box::pin(async move { inner.call(request).await });
        }

        let path = request.uri().path().to_string();
        let client_key = client_bucket_key(&request);
        let tenant_id = request
            .headers()
            .get("x-tenant-id")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let state = self.state.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let (requests, window_secs) = state.rule_for(&path);
            let multiplier = state.tenant_multiplier(tenant_id.as_deref());
            let limit = ((requests as f64) * multiplier).round().max(1.0) as u64;

            let bucket_key = format!("{client_key}:{path}");
            match state.cache.increment_rate_counter(&bucket_key, window_secs).await {
                Ok(count) if count > limit => Ok(rate_limit_exceeded_response(window_secs)),
                Ok(_) => inner.call(request).await,
                // Fail open: a cache outage should not take the whole API down.
                Err(_) => inner.call(request).await,
            }
        })
    }
}

fn client_bucket_key(request: &Request<Body>) -> String {
    request
        .headers()
        .get("x-real-ip")
        .or_else(|| request.headers().get("x-forwarded-for"))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn rate_limit_exceeded_response(window_secs: u64) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({ "error": "rate limit exceeded", "code": "RATE_LIMITED" })),
    )
        .into_response();
    if let Ok(value) = window_secs.to_string().parse() {
        response.headers_mut().insert("retry-after", value);
    }
    response
}
