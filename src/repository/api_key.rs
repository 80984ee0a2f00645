//! API-key repository: machine credentials, looked up by key id (`kid`).

use crate::domain::api_key::{ApiKey, RateLimitTier};
use crate::domain::common::StringUuid;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;
use uuid::Uuid;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ApiKeyRepository: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    async fn create(
        &self,
        service_account_id: Uuid,
        tenant_id: Uuid,
        name: &str,
        hashed_secret: &str,
        prefix: &str,
        kid: &str,
        permissions: &[String],
        rate_limit_tier: RateLimitTier,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<ApiKey>;
    /// O(1) lookup by key id, avoiding a scan over hashed secrets.
    async fn find_by_kid(&self, kid: &str) -> Result<Option<ApiKey>>;
    async fn list_for_service_account(&self, service_account_id: Uuid) -> Result<Vec<ApiKey>>;
    async fn revoke(&self, id: Uuid) -> Result<()>;
}

pub struct ApiKeyRepositoryImpl {
    pool: MySqlPool,
}

impl ApiKeyRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    const COLUMNS: &'static str = "id, service_account_id, tenant_id, name, hashed_secret, prefix, kid, permissions, rate_limit_tier, expires_at, revoked_at, created_at";
}

#[async_trait]
impl ApiKeyRepository for ApiKeyRepositoryImpl {
    async fn create(
        &self,
        service_account_id: Uuid,
        tenant_id: Uuid,
        name: &str,
        hashed_secret: &str,
        prefix: &str,
        kid: &str,
        permissions: &[String],
        rate_limit_tier: RateLimitTier,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<ApiKey> {
        let id = StringUuid::new_v4();
        let permissions_json = serde_json::to_string(permissions).map_err(|e| AppError::Internal(e.into()))?;

        sqlx::query(
            r#"
            INSERT INTO api_keys (id, service_account_id, tenant_id, name, hashed_secret, prefix, kid, permissions, rate_limit_tier, expires_at, revoked_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, NOW())
            "#,
        )
        .bind(id)
        .bind(StringUuid::from(service_account_id))
        .bind(StringUuid::from(tenant_id))
        .bind(name)
        .bind(hashed_secret)
        .bind(prefix)
        .bind(kid)
        .bind(&permissions_json)
        .bind(rate_limit_tier)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        self.find_by_kid(kid)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("failed to create api key")))
    }

    async fn find_by_kid(&self, kid: &str) -> Result<Option<ApiKey>> {
        let query = format!("SELECT {} FROM api_keys WHERE kid = ?", Self::COLUMNS);
        Ok(sqlx::query_as::<_, ApiKey>(&query)
            .bind(kid)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_for_service_account(&self, service_account_id: Uuid) -> Result<Vec<ApiKey>> {
        let query = format!(
            "SELECT {} FROM api_keys WHERE service_account_id = ? ORDER BY created_at DESC",
            Self::COLUMNS
        );
        Ok(sqlx::query_as::<_, ApiKey>(&query)
            .bind(StringUuid::from(service_account_id))
            .fetch_all(&self.pool)
            .await?)
    }

    async fn revoke(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("UPDATE api_keys SET revoked_at = NOW() WHERE id = ? AND revoked_at IS NULL")
            .bind(StringUuid::from(id))
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("api key not found or already revoked".to_string()));
        }
        Ok(())
    }
}
