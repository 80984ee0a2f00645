//! User and tenant-membership repository.

use crate::domain::common::StringUuid;
use crate::domain::{AddTenantMemberInput, CreateUserInput, TenantMember, UpdateUserInput, User};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::MySqlPool;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, input: &CreateUserInput) -> Result<User>;
    async fn find_by_id(&self, id: StringUuid) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<User>>;
    async fn count(&self) -> Result<i64>;
    async fn update(&self, id: StringUuid, input: &UpdateUserInput) -> Result<User>;
    async fn delete(&self, id: StringUuid) -> Result<()>;

    async fn add_member(&self, input: &AddTenantMemberInput) -> Result<TenantMember>;
    async fn remove_member(&self, tenant_id: StringUuid, user_id: StringUuid) -> Result<()>;
    async fn find_member(
        &self,
        tenant_id: StringUuid,
        user_id: StringUuid,
    ) -> Result<Option<TenantMember>>;
    async fn list_members(&self, tenant_id: StringUuid) -> Result<Vec<TenantMember>>;
    async fn list_memberships_for_user(&self, user_id: StringUuid) -> Result<Vec<TenantMember>>;
}

pub struct UserRepositoryImpl {
    pool: MySqlPool,
}

impl UserRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    const COLUMNS: &'static str =
        "id, email, email_verified, display_name, avatar_url, status, metadata, created_at, updated_at";
}

#[async_trait]
impl UserRepository for UserRepositoryImpl {
    async fn create(&self, input: &CreateUserInput) -> Result<User> {
        let id = StringUuid::new_v4();
        let email = User::normalize_email(&input.email);
        let metadata_json = serde_json::to_string(&input.metadata.clone().unwrap_or_default())
            .map_err(|e| AppError::Internal(e.into()))?;

        sqlx::query(
            r#"
            INSERT INTO users (id, email, email_verified, display_name, avatar_url, status, metadata, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 'active', ?, NOW(), NOW())
            "#,
        )
        .bind(id)
        .bind(&email)
        .bind(input.email_verified)
        .bind(&input.display_name)
        .bind(&input.avatar_url)
        .bind(&metadata_json)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("failed to create user")))
    }

    async fn find_by_id(&self, id: StringUuid) -> Result<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE id = ?", Self::COLUMNS);
        Ok(sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE email = ?", Self::COLUMNS);
        Ok(sqlx::query_as::<_, User>(&query)
            .bind(User::normalize_email(email))
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<User>> {
        let query = format!(
            "SELECT {} FROM users ORDER BY created_at DESC LIMIT ? OFFSET ?",
            Self::COLUMNS
        );
        Ok(sqlx::query_as::<_, User>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn count(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    async fn update(&self, id: StringUuid, input: &UpdateUserInput) -> Result<User> {
        let existing = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {id} not found")))?;

        let display_name = input.display_name.clone().or(existing.display_name);
        let avatar_url = input.avatar_url.clone().or(existing.avatar_url);
        let status = input.status.unwrap_or(existing.status);
        let metadata = input
            .metadata
            .clone()
            .unwrap_or_else(|| existing.metadata.0.clone());
        let metadata_json =
            serde_json::to_string(&metadata).map_err(|e| AppError::Internal(e.into()))?;

        sqlx::query(
            "UPDATE users SET display_name = ?, avatar_url = ?, status = ?, metadata = ?, updated_at = NOW() WHERE id = ?",
        )
        .bind(&display_name)
        .bind(&avatar_url)
        .bind(status)
        .bind(&metadata_json)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("failed to update user")))
    }

    async fn delete(&self, id: StringUuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("user {id} not found")));
        }
        Ok(())
    }

    async fn add_member(&self, input: &AddTenantMemberInput) -> Result<TenantMember> {
        let id = StringUuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO tenant_members (id, tenant_id, user_id, role, custom_role_name, joined_at, inherited_from)
            VALUES (?, ?, ?, ?, ?, NOW(), ?)
            "#,
        )
        .bind(id)
        .bind(StringUuid::from(input.tenant_id))
        .bind(StringUuid::from(input.user_id))
        .bind(input.role)
        .bind(&input.custom_role_name)
        .bind(input.inherited_from.map(StringUuid::from))
        .execute(&self.pool)
        .await?;

        self.find_member(input.tenant_id.into(), input.user_id.into())
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("failed to add tenant member")))
    }

    async fn remove_member(&self, tenant_id: StringUuid, user_id: StringUuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM tenant_members WHERE tenant_id = ? AND user_id = ?")
            .bind(tenant_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("tenant membership not found".to_string()));
        }
        Ok(())
    }

    async fn find_member(
        &self,
        tenant_id: StringUuid,
        user_id: StringUuid,
    ) -> Result<Option<TenantMember>> {
        Ok(sqlx::query_as::<_, TenantMember>(
            "SELECT id, tenant_id, user_id, role, custom_role_name, joined_at, inherited_from FROM tenant_members WHERE tenant_id = ? AND user_id = ?",
        )
        .bind(tenant_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_members(&self, tenant_id: StringUuid) -> Result<Vec<TenantMember>> {
        Ok(sqlx::query_as::<_, TenantMember>(
            "SELECT id, tenant_id, user_id, role, custom_role_name, joined_at, inherited_from FROM tenant_members WHERE tenant_id = ? ORDER BY joined_at ASC",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_memberships_for_user(&self, user_id: StringUuid) -> Result<Vec<TenantMember>> {
        Ok(sqlx::query_as::<_, TenantMember>(
            "SELECT id, tenant_id, user_id, role, custom_role_name, joined_at, inherited_from FROM tenant_members WHERE user_id = ? ORDER BY joined_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
