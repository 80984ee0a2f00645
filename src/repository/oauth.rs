//! OAuth federation repository: provider identity bindings.

use crate::domain::common::StringUuid;
use crate::domain::oauth::{OAuthAccount, OAuthProviderId};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::MySqlPool;
use uuid::Uuid;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OAuthRepository: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    async fn upsert(
        &self,
        user_id: Uuid,
        provider: OAuthProviderId,
        provider_account_id: &str,
        provider_email: Option<&str>,
        encrypted_access_token: &str,
        encrypted_refresh_token: Option<&str>,
        encrypted_id_token: Option<&str>,
        token_expires_at: Option<DateTime<Utc>>,
        scope: &[String],
        profile_snapshot: &Value,
    ) -> Result<OAuthAccount>;
    async fn find_by_provider_account(
        &self,
        provider: OAuthProviderId,
        provider_account_id: &str,
    ) -> Result<Option<OAuthAccount>>;
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<OAuthAccount>>;
    async fn unlink(&self, user_id: Uuid, provider: OAuthProviderId) -> Result<()>;
}

pub struct OAuthRepositoryImpl {
    pool: MySqlPool,
}

impl OAuthRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    const COLUMNS: &'static str = "id, user_id, provider, provider_account_id, provider_email, encrypted_access_token, encrypted_refresh_token, encrypted_id_token, token_expires_at, scope, profile_snapshot, created_at, updated_at";
}

#[async_trait]
impl OAuthRepository for OAuthRepositoryImpl {
    async fn upsert(
        &self,
        user_id: Uuid,
        provider: OAuthProviderId,
        provider_account_id: &str,
        provider_email: Option<&str>,
        encrypted_access_token: &str,
        encrypted_refresh_token: Option<&str>,
        encrypted_id_token: Option<&str>,
        token_expires_at: Option<DateTime<Utc>>,
        scope: &[String],
        profile_snapshot: &Value,
    ) -> Result<OAuthAccount> {
        let scope_json = serde_json::to_string(scope).map_err(|e| AppError::Internal(e.into()))?;
        let profile_json =
            serde_json::to_string(profile_snapshot).map_err(|e| AppError::Internal(e.into()))?;

        let existing = self.find_by_provider_account(provider, provider_account_id).await?;
        let id = existing.as_ref().map(|a| a.id).unwrap_or_else(StringUuid::new_v4);

        sqlx::query(
            r#"
            INSERT INTO oauth_accounts (id, user_id, provider, provider_account_id, provider_email, encrypted_access_token, encrypted_refresh_token, encrypted_id_token, token_expires_at, scope, profile_snapshot, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NOW(), NOW())
            ON DUPLICATE KEY UPDATE
                provider_email = VALUES(provider_email),
                encrypted_access_token = VALUES(encrypted_access_token),
                encrypted_refresh_token = VALUES(encrypted_refresh_token),
                encrypted_id_token = VALUES(encrypted_id_token),
                token_expires_at = VALUES(token_expires_at),
                scope = VALUES(scope),
                profile_snapshot = VALUES(profile_snapshot),
                updated_at = NOW()
            "#,
        )
        .bind(id)
        .bind(StringUuid::from(user_id))
        .bind(provider)
        .bind(provider_account_id)
        .bind(provider_email)
        .bind(encrypted_access_token)
        .bind(encrypted_refresh_token)
        .bind(encrypted_id_token)
        .bind(token_expires_at)
        .bind(&scope_json)
        .bind(&profile_json)
        .execute(&self.pool)
        .await?;

        self.find_by_provider_account(provider, provider_account_id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("failed to upsert oauth account")))
    }

    async fn find_by_provider_account(
        &self,
        provider: OAuthProviderId,
        provider_account_id: &str,
    ) -> Result<Option<OAuthAccount>> {
        let query = format!(
            "SELECT {} FROM oauth_accounts WHERE provider = ? AND provider_account_id = ?",
            Self::COLUMNS
        );
        Ok(sqlx::query_as::<_, OAuthAccount>(&query)
            .bind(provider)
            .bind(provider_account_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<OAuthAccount>> {
        let query = format!("SELECT {} FROM oauth_accounts WHERE user_id = ?", Self::COLUMNS);
        Ok(sqlx::query_as::<_, OAuthAccount>(&query)
            .bind(StringUuid::from(user_id))
            .fetch_all(&self.pool)
            .await?)
    }

    async fn unlink(&self, user_id: Uuid, provider: OAuthProviderId) -> Result<()> {
        let result = sqlx::query("DELETE FROM oauth_accounts WHERE user_id = ? AND provider = ?")
            .bind(StringUuid::from(user_id))
            .bind(provider)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("oauth account not found".to_string()));
        }
        Ok(())
    }
}
