//! Server initialization and routing.

use crate::api;
use crate::cache::{AnyCache, CacheManager, NoOpCacheManager};
use crate::config::Config;
use crate::email::smtp::SmtpEmailSender;
use crate::email::NoopEmailSender;
use crate::jwt::JwtManager;
use crate::middleware::rate_limit::{RateLimitLayer, RateLimitState};
use crate::middleware::security_headers::security_headers_middleware;
use crate::policy::AuthorizationEngine;
use crate::repository::{
    AbacRepositoryImpl, ApiKeyRepositoryImpl, AuditRepositoryImpl, MagicLinkRepositoryImpl,
    OAuthRepositoryImpl, RbacRepositoryImpl, SessionRepositoryImpl, TenantRepositoryImpl,
    UserRepositoryImpl, WebhookRepositoryImpl,
};
use crate::service::{
    oauth::{GithubProvider, GoogleProvider, OAuthProvider},
    AbacService, ApiKeyService, AuditService, MagicLinkService, OAuthService, RbacService,
    SessionService, TenantService, UserService, WebhookService,
};
use crate::state::{AnyEmailSender, AppState};
use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::mysql::MySqlPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

/// Build the CORS layer from configuration. An empty allow-list means
/// same-origin only and no `Access-Control-Allow-Origin` header is emitted.
fn build_cors_layer(config: &crate::config::CorsConfig) -> CorsLayer {
    use axum::http::{header, Method};

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::PATCH, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::ORIGIN,
            "x-tenant-id".parse().unwrap(),
            "x-forwarded-for".parse().unwrap(),
        ]);

    if config.allowed_origins.is_empty() {
        return cors.allow_origin(AllowOrigin::list(Vec::<axum::http::HeaderValue>::new()));
    }

    if config.allowed_origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }

    let origins: Vec<_> = config.allowed_origins.iter().filter_map(|o| o.parse().ok()).collect();
    cors.allow_origin(AllowOrigin::list(origins)).allow_credentials(true)
}

fn configured_oauth_providers(config: &crate::config::OAuthConfig, http_client: reqwest::Client) -> Vec<Arc<dyn OAuthProvider>> {
    let mut providers: Vec<Arc<dyn OAuthProvider>> = Vec::new();
    if let Some(github) = &config.github {
        providers.push(Arc::new(GithubProvider::new(http_client.clone(), github.clone())));
    }
    if let Some(google) = &config.google {
        providers.push(Arc::new(GoogleProvider::new(http_client.clone(), google.clone())));
    }
    if config.apple.is_some() || config.microsoft.is_some() {
        tracing::warn!("apple/microsoft oauth credentials configured but no provider implementation is wired up");
    }
    providers
}

/// Assemble every repository, service, and the authorization engine, then
/// serve the HTTP API until a shutdown signal arrives.
pub async fn run(config: Config, prometheus_handle: Option<PrometheusHandle>) -> Result<()> {
    let db_pool = MySqlPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await?;
    info!("Connected to database");

    let cache: Arc<AnyCache> = match CacheManager::new(&config.redis).await {
        Ok(manager) => {
            info!("Connected to Redis");
            Arc::new(AnyCache::Redis(manager))
        }
        Err(err) => {
            tracing::warn!(%err, "Redis unavailable, falling back to no-op cache");
            Arc::new(AnyCache::NoOp(NoOpCacheManager))
        }
    };

    let jwt_manager = Arc::new(JwtManager::new(config.jwt.clone()));

    let tenant_repo = Arc::new(TenantRepositoryImpl::new(db_pool.clone()));
    let user_repo = Arc::new(UserRepositoryImpl::new(db_pool.clone()));
    let rbac_repo = Arc::new(RbacRepositoryImpl::new(db_pool.clone()));
    let abac_repo = Arc::new(AbacRepositoryImpl::new(db_pool.clone()));
    let audit_repo = Arc::new(AuditRepositoryImpl::new(db_pool.clone()));
    let session_repo = Arc::new(SessionRepositoryImpl::new(db_pool.clone()));
    let magic_link_repo = Arc::new(MagicLinkRepositoryImpl::new(db_pool.clone()));
    let oauth_repo = Arc::new(OAuthRepositoryImpl::new(db_pool.clone()));
    let webhook_repo = Arc::new(WebhookRepositoryImpl::new(db_pool.clone()));
    let api_key_repo = Arc::new(ApiKeyRepositoryImpl::new(db_pool.clone()));

    let audit: Arc<AuditService<AuditRepositoryImpl>> = Arc::new(AuditService::new(audit_repo));

    let authorization_engine = Arc::new(AuthorizationEngine::new(
        rbac_repo.clone(),
        abac_repo.clone(),
        tenant_repo.clone(),
        cache.clone(),
    ));

    let session = Arc::new(SessionService::new(session_repo, cache.clone(), audit.clone()));

    let email_sender: Arc<AnyEmailSender> = if config.smtp.username.is_some() {
        Arc::new(AnyEmailSender::Smtp(SmtpEmailSender::from_config(&config.smtp)?))
    } else {
        Arc::new(AnyEmailSender::Noop(NoopEmailSender))
    };
    let magic_link = Arc::new(MagicLinkService::new(
        magic_link_repo,
        user_repo.clone(),
        cache.clone(),
        email_sender,
        config.magic_link.clone(),
    ));

    let http_client = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;
    let oauth = Arc::new(OAuthService::new(
        oauth_repo,
        user_repo.clone(),
        cache.clone(),
        configured_oauth_providers(&config.oauth, http_client),
        &config.oauth,
        &config.encryption,
    ));

    let tenant = Arc::new(TenantService::new(tenant_repo, audit.clone()));
    let rbac = Arc::new(RbacService::new(rbac_repo.clone(), authorization_engine.clone(), audit.clone()));
    let abac = Arc::new(AbacService::new(abac_repo, authorization_engine.clone(), audit.clone()));
    let user = Arc::new(UserService::new(user_repo, audit.clone()));
    let webhook = Arc::new(WebhookService::new(webhook_repo, &config.encryption));
    let api_key = Arc::new(ApiKeyService::new(api_key_repo, audit.clone()));

    let state = AppState {
        config: Arc::new(config.clone()),
        db_pool,
        cache,
        jwt_manager,
        audit,
        session,
        magic_link,
        oauth,
        tenant,
        rbac,
        abac,
        user,
        webhook,
        authorization_engine,
        api_key,
    };

    let rate_limit_state = RateLimitState::new(config.rate_limit.clone(), state.cache.clone());
    let router = build_full_router(state, rate_limit_state, Arc::new(prometheus_handle));

    let listener = TcpListener::bind(config.http_addr()).await?;
    info!("Listening on {}", config.http_addr());

    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

/// Build the full HTTP router: public routes (no bearer token required),
/// protected routes (the `AuthUser` extractor enforces auth per-handler),
/// and the metrics endpoint on its own state.
pub fn build_full_router(state: AppState, rate_limit_state: RateLimitState, prometheus_handle: Arc<Option<PrometheusHandle>>) -> Router {
    let cors = build_cors_layer(&state.config.cors);
    let security_headers_config = state.config.security_headers.clone();

    // Routes are not split into public/protected router groups: auth is
    // enforced per-handler by the `AuthUser` extractor, not by a blanket
    // middleware layer, so every path lives on one router regardless of
    // whether its handlers require a bearer token.
    let api_routes = Router::new()
        .route("/health", get(api::health::health))
        .route("/ready", get(api::health::ready))
        .route("/.well-known/jwks.json", get(api::auth::jwks))
        .route("/auth/magic-link/request", post(api::auth::request_magic_link))
        .route("/auth/magic-link/verify", post(api::auth::verify_magic_link))
        .route("/auth/oauth/{provider}/start", get(api::auth::oauth_begin))
        .route("/auth/oauth/{provider}/callback", get(api::auth::oauth_callback))
        .route("/auth/refresh", post(api::auth::refresh))
        .route("/tenants/by-slug/{slug}", get(api::tenant::get_by_slug))
        .route("/auth/logout", post(api::auth::logout))
        .route("/auth/userinfo", get(api::auth::userinfo))
        .route("/auth/oauth/linked", get(api::auth::list_linked_accounts))
        .route("/auth/oauth/{provider}", delete(api::auth::unlink_account))
        .route("/sessions", get(api::session::list_my_sessions))
        .route("/sessions/revoke-others", post(api::session::revoke_other_sessions))
        .route("/sessions/{id}", delete(api::session::revoke_session))
        .route("/admin/users/{id}/force-logout", post(api::session::force_logout_user))
        .route("/tenants", post(api::tenant::create))
        .route("/tenants/reparent", post(api::tenant::reparent))
        .route("/tenants/{id}", get(api::tenant::get).patch(api::tenant::update).delete(api::tenant::delete))
        .route("/tenants/{id}/children", get(api::tenant::list_children))
        .route("/tenants/{id}/descendants", get(api::tenant::list_descendants))
        .route(
            "/tenants/{tenant_id}/members",
            get(api::user::list_members).post(api::user::add_member),
        )
        .route("/tenants/{tenant_id}/members/{user_id}", delete(api::user::remove_member))
        .route("/users", get(api::user::list).post(api::user::create))
        .route("/users/me", get(api::user::me))
        .route("/users/{id}", get(api::user::get).patch(api::user::update).delete(api::user::delete))
        .route("/users/{id}/memberships", get(api::user::list_memberships))
        .route("/tenants/{tenant_id}/roles", get(api::rbac::list_roles).post(api::rbac::create_role))
        .route(
            "/tenants/{tenant_id}/roles/{id}",
            patch(api::rbac::update_role).delete(api::rbac::delete_role),
        )
        .route("/roles/{id}", get(api::rbac::get_role))
        .route("/tenants/{tenant_id}/rbac/assign", post(api::rbac::assign_role))
        .route(
            "/tenants/{tenant_id}/rbac/assignments/{user_id}/{role_id}",
            delete(api::rbac::unassign_role),
        )
        .route("/tenants/{tenant_id}/rbac/assignments/{user_id}", get(api::rbac::list_assignments))
        .route("/tenants/{tenant_id}/grants", post(api::rbac::create_grant))
        .route("/tenants/{tenant_id}/grants/{user_id}", get(api::rbac::list_grants))
        .route("/tenants/{tenant_id}/grants/{id}", delete(api::rbac::revoke_grant))
        .route("/tenants/{tenant_id}/policies", get(api::abac::list).post(api::abac::create))
        .route(
            "/tenants/{tenant_id}/policies/{id}",
            patch(api::abac::update).delete(api::abac::delete),
        )
        .route("/policies/{id}", get(api::abac::get))
        .route("/tenants/{tenant_id}/authorize/simulate", post(api::abac::simulate))
        .route("/tenants/{tenant_id}/authorize/many", post(api::abac::authorize_many))
        .route("/tenants/{tenant_id}/authorize/matrix", post(api::abac::permission_matrix))
        .route(
            "/tenants/{tenant_id}/webhooks",
            get(api::webhook::list).post(api::webhook::create),
        )
        .route(
            "/tenants/{tenant_id}/webhooks/{id}",
            get(api::webhook::get).patch(api::webhook::update).delete(api::webhook::delete),
        )
        .route("/tenants/{tenant_id}/webhooks/{id}/regenerate-secret", post(api::webhook::regenerate_secret))
        .route("/tenants/{tenant_id}/webhooks/{id}/test", post(api::webhook::test))
        .route(
            "/tenants/{tenant_id}/service-accounts/{service_account_id}/api-keys",
            get(api::api_key::list).post(api::api_key::create),
        )
        .route("/tenants/{tenant_id}/api-keys/{id}", delete(api::api_key::revoke))
        .route("/tenants/{tenant_id}/audit-events", get(api::audit::list));

    let metrics_route: Router<()> = Router::new()
        .route("/metrics", get(api::metrics::metrics_handler))
        .with_state(prometheus_handle);

    let body_limit = state.config.server_limits.body_limit_bytes;
    let request_timeout = Duration::from_secs(state.config.server_limits.request_timeout_secs);
    let concurrency_limit = state.config.server_limits.max_concurrent_requests;

    api_routes
        .fallback(|| async { (axum::http::StatusCode::NOT_FOUND, "Not Found") })
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum::middleware::from_fn_with_state(security_headers_config, security_headers_middleware))
        .layer(axum::middleware::from_fn(crate::middleware::normalize_error_response))
        .layer(TraceLayer::new_for_http())
        .layer(crate::middleware::ObservabilityLayer)
        .layer(TimeoutLayer::with_status_code(axum::http::StatusCode::REQUEST_TIMEOUT, request_timeout))
        .layer(RateLimitLayer::new(rate_limit_state))
        .layer(
            ServiceBuilder::new()
                .layer(axum::error_handling::HandleErrorLayer::new(|_: tower::BoxError| async {
                    axum::http::StatusCode::SERVICE_UNAVAILABLE
                }))
                .load_shed()
                .concurrency_limit(concurrency_limit),
        )
        .layer(cors)
        .with_state(state)
        .merge(metrics_route)
}
