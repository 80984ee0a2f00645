//! Session repository: the jti-keyed bearer-token grant table.

use crate::domain::common::StringUuid;
use crate::domain::{CreateSessionInput, Session};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::MySqlPool;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, input: &CreateSessionInput) -> Result<Session>;
    async fn find_by_id(&self, id: StringUuid) -> Result<Option<Session>>;
    async fn list_live_for_user(&self, user_id: StringUuid) -> Result<Vec<Session>>;
    async fn count_live_for_user(&self, user_id: StringUuid) -> Result<i64>;
    /// Oldest live session for a user, evicted first when the concurrency cap is hit.
    async fn find_oldest_live_for_user(&self, user_id: StringUuid) -> Result<Option<Session>>;
    async fn touch(&self, id: StringUuid) -> Result<()>;
    async fn revoke(&self, id: StringUuid, reason: &str) -> Result<()>;
    async fn revoke_all_for_user(&self, user_id: StringUuid, reason: &str) -> Result<u64>;
}

pub struct SessionRepositoryImpl {
    pool: MySqlPool,
}

impl SessionRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    const COLUMNS: &'static str = "id, user_id, tenant_id, device_fingerprint, device_type, device_name, ip_address, user_agent, issued_at, last_used_at, expires_at, revoked_at, revocation_reason";
}

#[async_trait]
impl SessionRepository for SessionRepositoryImpl {
    async fn create(&self, input: &CreateSessionInput) -> Result<Session> {
        let id = StringUuid::new_v4();
        let now = chrono::Utc::now();
        let expires_at = now + input.ttl;
        let (device_type, device_name) = input
            .user_agent
            .as_deref()
            .map(crate::domain::session::parse_user_agent)
            .unwrap_or((None, None));

        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, tenant_id, device_fingerprint, device_type, device_name, ip_address, user_agent, issued_at, last_used_at, expires_at, revoked_at, revocation_reason)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, NULL)
            "#,
        )
        .bind(id)
        .bind(input.user_id)
        .bind(input.tenant_id)
        .bind(&input.device_fingerprint)
        .bind(&device_type)
        .bind(&device_name)
        .bind(&input.ip_address)
        .bind(&input.user_agent)
        .bind(now)
        .bind(now)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("failed to create session")))
    }

    async fn find_by_id(&self, id: StringUuid) -> Result<Option<Session>> {
        let query = format!("SELECT {} FROM sessions WHERE id = ?", Self::COLUMNS);
        Ok(sqlx::query_as::<_, Session>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_live_for_user(&self, user_id: StringUuid) -> Result<Vec<Session>> {
        let query = format!(
            "SELECT {} FROM sessions WHERE user_id = ? AND revoked_at IS NULL AND expires_at > NOW() ORDER BY issued_at DESC",
            Self::COLUMNS
        );
        Ok(sqlx::query_as::<_, Session>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn count_live_for_user(&self, user_id: StringUuid) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sessions WHERE user_id = ? AND revoked_at IS NULL AND expires_at > NOW()",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    async fn find_oldest_live_for_user(&self, user_id: StringUuid) -> Result<Option<Session>> {
        let query = format!(
            "SELECT {} FROM sessions WHERE user_id = ? AND revoked_at IS NULL AND expires_at > NOW() ORDER BY issued_at ASC LIMIT 1",
            Self::COLUMNS
        );
        Ok(sqlx::query_as::<_, Session>(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn touch(&self, id: StringUuid) -> Result<()> {
        sqlx::query("UPDATE sessions SET last_used_at = NOW() WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn revoke(&self, id: StringUuid, reason: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE sessions SET revoked_at = NOW(), revocation_reason = ? WHERE id = ? AND revoked_at IS NULL",
        )
        .bind(reason)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("session {id} not found or already revoked")));
        }
        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: StringUuid, reason: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE sessions SET revoked_at = NOW(), revocation_reason = ? WHERE user_id = ? AND revoked_at IS NULL",
        )
        .bind(reason)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
