//! Magic-link repository: single-use, hash-stored passwordless tokens.

use crate::domain::common::StringUuid;
use crate::domain::magic_link::MagicLinkToken;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;
use uuid::Uuid;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MagicLinkRepository: Send + Sync {
    async fn create(&self, user_id: Uuid, token_hash: &str, expires_at: DateTime<Utc>) -> Result<MagicLinkToken>;
    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<MagicLinkToken>>;
    async fn mark_consumed(&self, id: Uuid) -> Result<()>;
    /// Deletes expired, never-consumed rows; returns how many were removed.
    async fn purge_expired(&self) -> Result<u64>;
}

pub struct MagicLinkRepositoryImpl {
    pool: MySqlPool,
}

impl MagicLinkRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    const COLUMNS: &'static str = "id, token_hash, user_id, expires_at, consumed_at, created_at";
}

#[async_trait]
impl MagicLinkRepository for MagicLinkRepositoryImpl {
    async fn create(&self, user_id: Uuid, token_hash: &str, expires_at: DateTime<Utc>) -> Result<MagicLinkToken> {
        let id = StringUuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO magic_link_tokens (id, token_hash, user_id, expires_at, consumed_at, created_at)
            VALUES (?, ?, ?, ?, NULL, NOW())
            "#,
        )
        .bind(id)
        .bind(token_hash)
        .bind(StringUuid::from(user_id))
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        self.find_by_hash(token_hash)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("failed to create magic link token")))
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<MagicLinkToken>> {
        let query = format!("SELECT {} FROM magic_link_tokens WHERE token_hash = ?", Self::COLUMNS);
        Ok(sqlx::query_as::<_, MagicLinkToken>(&query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn mark_consumed(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE magic_link_tokens SET consumed_at = NOW() WHERE id = ? AND consumed_at IS NULL",
        )
        .bind(StringUuid::from(id))
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::Conflict("magic link token already consumed".to_string()));
        }
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM magic_link_tokens WHERE expires_at < NOW()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
