//! HTTP middleware for the identity and access kernel's REST API:
//! bearer-token authentication, rate limiting, request observability,
//! security headers, client-IP normalization, and error-response shaping.

pub mod auth;
pub mod client_ip;
pub mod error_response;
pub mod metrics;
pub mod rate_limit;
pub mod security_headers;
pub mod trace;

pub use auth::{AuthError, AuthUser, OptionalAuth};
pub use client_ip::inject_client_ip;
pub use error_response::normalize_error_response;
pub use metrics::ObservabilityLayer;
pub use rate_limit::{RateLimitLayer, RateLimitState};
pub use security_headers::security_headers_middleware;
pub use trace::SanitizedMakeSpan;
