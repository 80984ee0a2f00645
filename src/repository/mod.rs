//! Data access layer (Repository pattern)

pub mod abac;
pub mod api_key;
pub mod audit;
pub mod magic_link;
pub mod oauth;
pub mod rbac;
pub mod session;
pub mod tenant;
pub mod user;
pub mod webhook;

pub use abac::{AbacRepository, AbacRepositoryImpl};
pub use api_key::{ApiKeyRepository, ApiKeyRepositoryImpl};
pub use audit::{AuditRepository, AuditRepositoryImpl};
pub use magic_link::{MagicLinkRepository, MagicLinkRepositoryImpl};
pub use oauth::{OAuthRepository, OAuthRepositoryImpl};
pub use rbac::{RbacRepository, RbacRepositoryImpl};
pub use session::{SessionRepository, SessionRepositoryImpl};
pub use tenant::{TenantRepository, TenantRepositoryImpl};
pub use user::{UserRepository, UserRepositoryImpl};
pub use webhook::{WebhookRepository, WebhookRepositoryImpl};

use sqlx::MySqlPool;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    pool: MySqlPool,
}

impl DbPool {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn inner(&self) -> &MySqlPool {
        &self.pool
    }
}

impl std::ops::Deref for DbPool {
    type Target = MySqlPool;

    fn deref(&self) -> &Self::Target {
        &self.pool
    }
}
