//! Concrete application state shared across HTTP handlers.

use std::sync::Arc;

use crate::cache::{AnyCache, CacheOperations};
use crate::config::Config;
use crate::email::{EmailSender, NoopEmailSender};
use crate::email::smtp::SmtpEmailSender;
use crate::jwt::JwtManager;
use crate::policy::AuthorizationEngine;
use crate::repository::{
    AbacRepositoryImpl, ApiKeyRepositoryImpl, AuditRepositoryImpl, MagicLinkRepositoryImpl,
    OAuthRepositoryImpl, RbacRepositoryImpl, SessionRepositoryImpl, TenantRepositoryImpl,
    UserRepositoryImpl, WebhookRepositoryImpl,
};
use crate::service::{
    AbacService, ApiKeyService, AuditService, MagicLinkService, OAuthService, RbacService,
    SessionService, TenantService, UserService, WebhookService,
};
use sqlx::MySqlPool;

/// Email sender used by the running service: real SMTP in production,
/// a logging no-op when SMTP isn't configured.
pub enum AnyEmailSender {
    Smtp(SmtpEmailSender),
    Noop(NoopEmailSender),
}

#[async_trait::async_trait]
impl EmailSender for AnyEmailSender {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> crate::error::Result<()> {
        match self {
            AnyEmailSender::Smtp(s) => s.send(to, subject, html_body, text_body).await,
            AnyEmailSender::Noop(s) => s.send(to, subject, html_body, text_body).await,
        }
    }
}

pub type AppAuditService = AuditService<AuditRepositoryImpl>;
pub type AppSessionService = SessionService<SessionRepositoryImpl, AnyCache>;
pub type AppMagicLinkService =
    MagicLinkService<MagicLinkRepositoryImpl, UserRepositoryImpl, AnyCache, AnyEmailSender>;
pub type AppOAuthService = OAuthService<OAuthRepositoryImpl, UserRepositoryImpl, AnyCache>;
pub type AppTenantService = TenantService<TenantRepositoryImpl>;
pub type AppRbacService = RbacService<RbacRepositoryImpl, AbacRepositoryImpl, TenantRepositoryImpl, AnyCache>;
pub type AppAbacService = AbacService<RbacRepositoryImpl, AbacRepositoryImpl, TenantRepositoryImpl, AnyCache>;
pub type AppUserService = UserService<UserRepositoryImpl>;
pub type AppWebhookService = WebhookService<WebhookRepositoryImpl>;
pub type AppApiKeyService = ApiKeyService<ApiKeyRepositoryImpl>;
pub type AppAuthorizationEngine =
    AuthorizationEngine<RbacRepositoryImpl, AbacRepositoryImpl, TenantRepositoryImpl, AnyCache>;

/// Shared, cloneable application state handed to every axum handler.
///
/// All fields are cheap to clone (`Arc` internally or `Copy`/small structs),
/// matching axum's `State<AppState>` extractor expectations.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db_pool: MySqlPool,
    pub cache: Arc<AnyCache>,
    pub jwt_manager: Arc<JwtManager>,
    pub audit: Arc<AppAuditService>,
    pub session: Arc<AppSessionService>,
    pub magic_link: Arc<AppMagicLinkService>,
    pub oauth: Arc<AppOAuthService>,
    pub tenant: Arc<AppTenantService>,
    pub rbac: Arc<AppRbacService>,
    pub abac: Arc<AppAbacService>,
    pub user: Arc<AppUserService>,
    pub webhook: Arc<AppWebhookService>,
    pub authorization_engine: Arc<AppAuthorizationEngine>,
    pub api_key: Arc<AppApiKeyService>,
}

impl AppState {
    /// Report whether the database and cache backends are currently reachable.
    pub async fn check_ready(&self) -> (bool, bool) {
        let db_ok = sqlx::query("SELECT 1").fetch_one(&self.db_pool).await.is_ok();
        let cache_ok = self.cache.ping().await.is_ok();
        (db_ok, cache_ok)
    }
}
