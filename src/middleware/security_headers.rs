//! Security headers middleware for REST API
//!
//! Adds standard security headers to all responses to protect against
//! common web vulnerabilities like XSS, clickjacking, and content sniffing.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};

use crate::config::SecurityHeadersConfig;

/// Security headers middleware function
///
/// Adds the following security headers to all responses:
/// - X-Content-Type-Options: nosniff
/// - X-Frame-Options: DENY
/// - X-XSS-Protection: 1; mode=block
/// - Referrer-Policy: strict-origin-when-cross-origin
/// - Cache-Control: no-store (for API responses)
/// - Permissions-Policy: geolocation=(), microphone=(), camera=()
pub async fn security_headers_middleware(
    State(config): State<SecurityHeadersConfig>,
    request: Request<Body>,
    next: Next,
) -> Response {
    // Decide whether this request should receive HSTS before we move `request` into `next.run`.
    let should_add_hsts = if config.hsts_enabled {
        if !config.hsts_https_only {
            true
        } else if config.hsts_trust_x_forwarded_proto {
            request
                .headers()
                .get("x-forwarded-proto")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.eq_ignore_ascii_case("https"))
                .unwrap_or(false)
        } else {
            false
        }
    } else {
        false
    };

    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    // Prevent MIME type sniffing
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, "nosniff".parse().unwrap());

    // Prevent clickjacking
    headers.insert(header::X_FRAME_OPTIONS, "DENY".parse().unwrap());

    // XSS protection (legacy but still useful for older browsers)
    headers.insert("X-XSS-Protection", "1; mode=block".parse().unwrap());

    // Control referrer information
    headers.insert(
        header::REFERRER_POLICY,
        "strict-origin-when-cross-origin".parse().unwrap(),
    );

    // Prevent caching of sensitive API responses
    headers.insert(
        header::CACHE_CONTROL,
        "no-store, no-cache, must-revalidate, private"
            .parse()
            .unwrap(),
    );

    // Restrict browser features
    headers.insert(
        "Permissions-Policy",
        "geolocation=(), microphone=(), camera=()".parse().unwrap(),
    );

    // HTTP Strict Transport Security (browsers will upgrade HTTP to HTTPS)
    //
    // IMPORTANT: Only emit HSTS for HTTPS responses. Sending it on HTTP (or in local dev)
    // can cause long-lived usability issues in browsers.
    if should_add_hsts {
        let mut value = format!("max-age={}", config.hsts_max_age_secs);
        if config.hsts_include_subdomains {
            value.push_str("; includeSubDomains");
        }
        if config.hsts_preload {
            value.push_str("; preload");
        }
        headers.insert(header::STRICT_TRANSPORT_SECURITY, value.parse().unwrap());
    }

    // Content Security Policy for API responses
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        "default-src 'none'; frame-ancestors 'none'"
            .parse()
            .unwrap(),
    );

    response
}
