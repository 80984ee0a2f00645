//! Prometheus metrics setup and metric definitions

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_prometheus_recorder() -> PrometheusHandle {
    // Default histogram buckets (seconds) for HTTP/Redis latency metrics.
    let buckets = vec![
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];

    PrometheusBuilder::new()
        .set_buckets(&buckets)
        .expect("failed to set histogram buckets")
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Register metric descriptions and emit initial zero values so Prometheus output
/// includes HELP/TYPE lines for all metrics from startup (not just after first use).
pub fn describe_metrics() {
    // HTTP metrics
    describe_counter!("identkern_http_requests_total", "Total number of HTTP requests");
    describe_histogram!(
        "identkern_http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_gauge!(
        "identkern_http_requests_in_flight",
        "Number of HTTP requests currently being processed"
    );

    // Database pool metrics
    describe_gauge!(
        "identkern_db_pool_connections_active",
        "Number of active database connections"
    );
    describe_gauge!(
        "identkern_db_pool_connections_idle",
        "Number of idle database connections"
    );

    // Redis metrics
    describe_counter!(
        "identkern_redis_operations_total",
        "Total number of Redis operations"
    );
    describe_histogram!(
        "identkern_redis_operation_duration_seconds",
        "Redis operation duration in seconds"
    );

    // Auth metrics
    describe_counter!("identkern_auth_login_total", "Total number of login attempts");
    describe_counter!(
        "identkern_auth_token_refresh_total",
        "Total number of token refresh requests"
    );
    describe_counter!(
        "identkern_auth_oauth_callback_total",
        "Total number of OAuth callback completions"
    );
    describe_counter!(
        "identkern_auth_invalid_state_total",
        "Total number of invalid OAuth callback state events"
    );

    // Security metrics
    describe_counter!(
        "identkern_security_alerts_total",
        "Total number of security alerts"
    );
    describe_counter!(
        "identkern_rate_limit_throttled_total",
        "Total number of rate-limited requests"
    );
    describe_counter!(
        "identkern_rate_limit_unavailable_total",
        "Total number of requests fail-closed because rate-limit backend was unavailable"
    );

    // Business metrics
    describe_gauge!("identkern_tenants_active_total", "Number of active tenants");
    describe_gauge!("identkern_users_active_total", "Number of active users");
    describe_gauge!("identkern_sessions_active_total", "Number of active sessions");
    describe_counter!(
        "identkern_webhook_deliveries_total",
        "Total number of webhook delivery attempts"
    );

    // Emit initial zero values for lazily-registered metrics so that
    // HELP/TYPE lines appear in Prometheus output from startup.
    // Gauges and metrics driven by background tasks (db_pool, business gauges)
    // or by the HTTP middleware (http_requests_*) self-initialise quickly, but
    // counters gated behind specific code-paths need an explicit zero-increment.
    counter!("identkern_auth_login_total", "result" => "success").absolute(0);
    counter!("identkern_auth_token_refresh_total", "result" => "success").absolute(0);
    counter!("identkern_auth_oauth_callback_total", "result" => "success").absolute(0);
    counter!("identkern_auth_invalid_state_total", "reason" => "missing").absolute(0);
    counter!("identkern_security_alerts_total", "type" => "brute_force", "severity" => "high")
        .absolute(0);
    counter!("identkern_rate_limit_throttled_total", "endpoint" => "").absolute(0);
    counter!(
        "identkern_rate_limit_unavailable_total",
        "endpoint" => "",
        "mode" => "fail_close"
    )
    .absolute(0);
    counter!("identkern_redis_operations_total", "operation" => "get").absolute(0);
    histogram!("identkern_redis_operation_duration_seconds", "operation" => "get").record(0.0);
    counter!("identkern_webhook_deliveries_total", "result" => "success").absolute(0);
    gauge!("identkern_http_requests_in_flight").set(0.0);
}
