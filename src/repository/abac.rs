//! ABAC policy repository.

use crate::domain::abac::{CreatePolicyInput, Policy, UpdatePolicyInput};
use crate::domain::common::StringUuid;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::MySqlPool;
use uuid::Uuid;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AbacRepository: Send + Sync {
    async fn create(&self, input: &CreatePolicyInput) -> Result<Policy>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Policy>>;
    /// All enabled policies for a tenant, highest priority first.
    async fn list_enabled_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<Policy>>;
    async fn list_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<Policy>>;
    async fn update(&self, id: Uuid, input: &UpdatePolicyInput) -> Result<Policy>;
    async fn delete(&self, id: Uuid) -> Result<()>;
}

pub struct AbacRepositoryImpl {
    pool: MySqlPool,
}

impl AbacRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    const COLUMNS: &'static str =
        "id, tenant_id, name, effect, resource_patterns, actions, conditions, priority, enabled, created_at, updated_at";
}

#[async_trait]
impl AbacRepository for AbacRepositoryImpl {
    async fn create(&self, input: &CreatePolicyInput) -> Result<Policy> {
        let id = StringUuid::new_v4();
        let resource_patterns_json =
            serde_json::to_string(&input.resource_patterns).map_err(|e| AppError::Internal(e.into()))?;
        let actions_json = serde_json::to_string(&input.actions).map_err(|e| AppError::Internal(e.into()))?;
        let conditions_json =
            serde_json::to_string(&input.conditions).map_err(|e| AppError::Internal(e.into()))?;

        sqlx::query(
            r#"
            INSERT INTO abac_policies (id, tenant_id, name, effect, resource_patterns, actions, conditions, priority, enabled, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, NOW(), NOW())
            "#,
        )
        .bind(id)
        .bind(StringUuid::from(input.tenant_id))
        .bind(&input.name)
        .bind(input.effect)
        .bind(&resource_patterns_json)
        .bind(&actions_json)
        .bind(&conditions_json)
        .bind(input.priority)
        .bind(input.enabled)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id.into())
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("failed to create policy")))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Policy>> {
        let query = format!("SELECT {} FROM abac_policies WHERE id = ?", Self::COLUMNS);
        Ok(sqlx::query_as::<_, Policy>(&query)
            .bind(StringUuid::from(id))
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_enabled_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<Policy>> {
        let query = format!(
            "SELECT {} FROM abac_policies WHERE tenant_id = ? AND enabled = true ORDER BY priority DESC",
            Self::COLUMNS
        );
        Ok(sqlx::query_as::<_, Policy>(&query)
            .bind(StringUuid::from(tenant_id))
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<Policy>> {
        let query = format!(
            "SELECT {} FROM abac_policies WHERE tenant_id = ? ORDER BY priority DESC, name ASC",
            Self::COLUMNS
        );
        Ok(sqlx::query_as::<_, Policy>(&query)
            .bind(StringUuid::from(tenant_id))
            .fetch_all(&self.pool)
            .await?)
    }

    async fn update(&self, id: Uuid, input: &UpdatePolicyInput) -> Result<Policy> {
        let existing = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("policy {id} not found")))?;

        let name = input.name.clone().unwrap_or(existing.name);
        let effect = input.effect.unwrap_or(existing.effect);
        let resource_patterns = input
            .resource_patterns
            .clone()
            .unwrap_or_else(|| existing.resource_patterns.0.clone());
        let actions = input.actions.clone().unwrap_or_else(|| existing.actions.0.clone());
        let conditions = input.conditions.clone().unwrap_or_else(|| existing.conditions.0.clone());
        let priority = input.priority.unwrap_or(existing.priority);
        let enabled = input.enabled.unwrap_or(existing.enabled);

        let resource_patterns_json =
            serde_json::to_string(&resource_patterns).map_err(|e| AppError::Internal(e.into()))?;
        let actions_json = serde_json::to_string(&actions).map_err(|e| AppError::Internal(e.into()))?;
        let conditions_json = serde_json::to_string(&conditions).map_err(|e| AppError::Internal(e.into()))?;

        sqlx::query(
            "UPDATE abac_policies SET name = ?, effect = ?, resource_patterns = ?, actions = ?, conditions = ?, priority = ?, enabled = ?, updated_at = NOW() WHERE id = ?",
        )
        .bind(&name)
        .bind(effect)
        .bind(&resource_patterns_json)
        .bind(&actions_json)
        .bind(&conditions_json)
        .bind(priority)
        .bind(enabled)
        .bind(StringUuid::from(id))
        .execute(&self.pool)
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("failed to update policy")))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM abac_policies WHERE id = ?")
            .bind(StringUuid::from(id))
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("policy {id} not found")));
        }
        Ok(())
    }
}
