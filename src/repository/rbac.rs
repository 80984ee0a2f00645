//! RBAC repository: role definitions, direct permission grants, and
//! user-role assignments.

use crate::domain::common::StringUuid;
use crate::domain::rbac::{CreateRoleInput, PermissionGrant, RoleDefinition, UpdateRoleInput, UserRoleAssignment};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::MySqlPool;
use uuid::Uuid;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RbacRepository: Send + Sync {
    async fn create_role(&self, input: &CreateRoleInput) -> Result<RoleDefinition>;
    async fn find_role_by_id(&self, id: Uuid) -> Result<Option<RoleDefinition>>;
    async fn find_role_by_name(&self, tenant_id: Uuid, name: &str) -> Result<Option<RoleDefinition>>;
    async fn list_roles_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<RoleDefinition>>;
    async fn update_role(&self, id: Uuid, input: &UpdateRoleInput) -> Result<RoleDefinition>;
    async fn delete_role(&self, id: Uuid) -> Result<()>;

    async fn create_grant(&self, grant: &PermissionGrant) -> Result<PermissionGrant>;
    async fn list_grants_for_user(&self, user_id: Uuid, tenant_id: Uuid) -> Result<Vec<PermissionGrant>>;
    async fn revoke_grant(&self, id: Uuid) -> Result<()>;

    async fn assign_role(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        role_id: Uuid,
        granted_by: Option<Uuid>,
    ) -> Result<UserRoleAssignment>;
    async fn unassign_role(&self, user_id: Uuid, tenant_id: Uuid, role_id: Uuid) -> Result<()>;
    async fn list_assignments_for_user(&self, user_id: Uuid, tenant_id: Uuid) -> Result<Vec<UserRoleAssignment>>;
    async fn count_assignees(&self, role_id: Uuid) -> Result<i64>;
}

pub struct RbacRepositoryImpl {
    pool: MySqlPool,
}

impl RbacRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    const ROLE_COLUMNS: &'static str =
        "id, tenant_id, name, permission_patterns, priority, expiry_days, immutable, created_at, updated_at";
    const GRANT_COLUMNS: &'static str =
        "id, user_id, tenant_id, resource_type, resource_id, actions, conditions, granted_by, expires_at, created_at";
    const ASSIGNMENT_COLUMNS: &'static str = "id, tenant_id, user_id, role_id, granted_at, granted_by";
}

#[async_trait]
impl RbacRepository for RbacRepositoryImpl {
    async fn create_role(&self, input: &CreateRoleInput) -> Result<RoleDefinition> {
        let id = StringUuid::new_v4();
        let patterns_json =
            serde_json::to_string(&input.permission_patterns).map_err(|e| AppError::Internal(e.into()))?;

        sqlx::query(
            r#"
            INSERT INTO role_definitions (id, tenant_id, name, permission_patterns, priority, expiry_days, immutable, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, false, NOW(), NOW())
            "#,
        )
        .bind(id)
        .bind(StringUuid::from(input.tenant_id))
        .bind(&input.name)
        .bind(&patterns_json)
        .bind(input.priority)
        .bind(input.expiry_days)
        .execute(&self.pool)
        .await?;

        self.find_role_by_id(id.into())
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("failed to create role")))
    }

    async fn find_role_by_id(&self, id: Uuid) -> Result<Option<RoleDefinition>> {
        let query = format!("SELECT {} FROM role_definitions WHERE id = ?", Self::ROLE_COLUMNS);
        Ok(sqlx::query_as::<_, RoleDefinition>(&query)
            .bind(StringUuid::from(id))
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_role_by_name(&self, tenant_id: Uuid, name: &str) -> Result<Option<RoleDefinition>> {
        let query = format!(
            "SELECT {} FROM role_definitions WHERE tenant_id = ? AND name = ?",
            Self::ROLE_COLUMNS
        );
        Ok(sqlx::query_as::<_, RoleDefinition>(&query)
            .bind(StringUuid::from(tenant_id))
            .bind(name)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_roles_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<RoleDefinition>> {
        let query = format!(
            "SELECT {} FROM role_definitions WHERE tenant_id = ? ORDER BY priority DESC, name ASC",
            Self::ROLE_COLUMNS
        );
        Ok(sqlx::query_as::<_, RoleDefinition>(&query)
            .bind(StringUuid::from(tenant_id))
            .fetch_all(&self.pool)
            .await?)
    }

    async fn update_role(&self, id: Uuid, input: &UpdateRoleInput) -> Result<RoleDefinition> {
        let existing = self
            .find_role_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role {id} not found")))?;
        if existing.immutable {
            return Err(AppError::Conflict("built-in role is immutable".to_string()));
        }

        let name = input.name.clone().unwrap_or(existing.name);
        let patterns = input
            .permission_patterns
            .clone()
            .unwrap_or_else(|| existing.permission_patterns.0.clone());
        let priority = input.priority.unwrap_or(existing.priority);
        let expiry_days = input.expiry_days.unwrap_or(existing.expiry_days);
        let patterns_json = serde_json::to_string(&patterns).map_err(|e| AppError::Internal(e.into()))?;

        sqlx::query(
            "UPDATE role_definitions SET name = ?, permission_patterns = ?, priority = ?, expiry_days = ?, updated_at = NOW() WHERE id = ?",
        )
        .bind(&name)
        .bind(&patterns_json)
        .bind(priority)
        .bind(expiry_days)
        .bind(StringUuid::from(id))
        .execute(&self.pool)
        .await?;

        self.find_role_by_id(id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("failed to update role")))
    }

    async fn delete_role(&self, id: Uuid) -> Result<()> {
        let existing = self
            .find_role_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role {id} not found")))?;
        if existing.immutable {
            return Err(AppError::Conflict("built-in role is immutable".to_string()));
        }
        let result = sqlx::query("DELETE FROM role_definitions WHERE id = ?")
            .bind(StringUuid::from(id))
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("role {id} not found")));
        }
        Ok(())
    }

    async fn create_grant(&self, grant: &PermissionGrant) -> Result<PermissionGrant> {
        let actions_json = serde_json::to_string(&grant.actions.0).map_err(|e| AppError::Internal(e.into()))?;
        let conditions_json =
            serde_json::to_string(&grant.conditions.0).map_err(|e| AppError::Internal(e.into()))?;

        sqlx::query(
            r#"
            INSERT INTO permission_grants (id, user_id, tenant_id, resource_type, resource_id, actions, conditions, granted_by, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, NOW())
            "#,
        )
        .bind(grant.id)
        .bind(grant.user_id)
        .bind(grant.tenant_id)
        .bind(&grant.resource_type)
        .bind(&grant.resource_id)
        .bind(&actions_json)
        .bind(&conditions_json)
        .bind(grant.granted_by)
        .bind(grant.expires_at)
        .execute(&self.pool)
        .await?;

        let query = format!("SELECT {} FROM permission_grants WHERE id = ?", Self::GRANT_COLUMNS);
        sqlx::query_as::<_, PermissionGrant>(&query)
            .bind(grant.id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("failed to create permission grant")))
    }

    async fn list_grants_for_user(&self, user_id: Uuid, tenant_id: Uuid) -> Result<Vec<PermissionGrant>> {
        let query = format!(
            "SELECT {} FROM permission_grants WHERE user_id = ? AND tenant_id = ?",
            Self::GRANT_COLUMNS
        );
        Ok(sqlx::query_as::<_, PermissionGrant>(&query)
            .bind(StringUuid::from(user_id))
            .bind(StringUuid::from(tenant_id))
            .fetch_all(&self.pool)
            .await?)
    }

    async fn revoke_grant(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM permission_grants WHERE id = ?")
            .bind(StringUuid::from(id))
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("permission grant {id} not found")));
        }
        Ok(())
    }

    async fn assign_role(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        role_id: Uuid,
        granted_by: Option<Uuid>,
    ) -> Result<UserRoleAssignment> {
        let id = StringUuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO user_role_assignments (id, tenant_id, user_id, role_id, granted_at, granted_by)
            VALUES (?, ?, ?, ?, NOW(), ?)
            "#,
        )
        .bind(id)
        .bind(StringUuid::from(tenant_id))
        .bind(StringUuid::from(user_id))
        .bind(StringUuid::from(role_id))
        .bind(granted_by.map(StringUuid::from))
        .execute(&self.pool)
        .await?;

        let query = format!("SELECT {} FROM user_role_assignments WHERE id = ?", Self::ASSIGNMENT_COLUMNS);
        sqlx::query_as::<_, UserRoleAssignment>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("failed to assign role")))
    }

    async fn unassign_role(&self, user_id: Uuid, tenant_id: Uuid, role_id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "DELETE FROM user_role_assignments WHERE user_id = ? AND tenant_id = ? AND role_id = ?",
        )
        .bind(StringUuid::from(user_id))
        .bind(StringUuid::from(tenant_id))
        .bind(StringUuid::from(role_id))
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("role assignment not found".to_string()));
        }
        Ok(())
    }

    async fn list_assignments_for_user(&self, user_id: Uuid, tenant_id: Uuid) -> Result<Vec<UserRoleAssignment>> {
        let query = format!(
            "SELECT {} FROM user_role_assignments WHERE user_id = ? AND tenant_id = ?",
            Self::ASSIGNMENT_COLUMNS
        );
        Ok(sqlx::query_as::<_, UserRoleAssignment>(&query)
            .bind(StringUuid::from(user_id))
            .bind(StringUuid::from(tenant_id))
            .fetch_all(&self.pool)
            .await?)
    }

    async fn count_assignees(&self, role_id: Uuid) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM user_role_assignments WHERE role_id = ?")
            .bind(StringUuid::from(role_id))
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }
}
