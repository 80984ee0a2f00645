//! Tenant repository: materialized-path hierarchy persistence.

use crate::domain::common::StringUuid;
use crate::domain::{CreateTenantInput, Tenant, UpdateTenantInput};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::MySqlPool;
use uuid::Uuid;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn create_root(&self, input: &CreateTenantInput) -> Result<Tenant>;
    async fn create_child(&self, parent: &Tenant, input: &CreateTenantInput) -> Result<Tenant>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Tenant>>;
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>>;
    /// All nodes whose path contains `ancestor_id` (includes the ancestor itself).
    async fn find_descendants(&self, ancestor_id: Uuid) -> Result<Vec<Tenant>>;
    async fn find_children(&self, parent_id: Uuid) -> Result<Vec<Tenant>>;
    async fn update(&self, id: Uuid, input: &UpdateTenantInput) -> Result<Tenant>;
    /// Rewrite `id`'s path (and every descendant's path) under a new parent.
    async fn reparent(&self, id: Uuid, new_parent: &Tenant) -> Result<Tenant>;
    async fn delete(&self, id: Uuid) -> Result<()>;
}

pub struct TenantRepositoryImpl {
    pool: MySqlPool,
}

impl TenantRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    const COLUMNS: &'static str = "id, parent_id, tenant_type, level, path, max_depth, slug, name, status, settings, created_at, updated_at";
}

#[async_trait]
impl TenantRepository for TenantRepositoryImpl {
    async fn create_root(&self, input: &CreateTenantInput) -> Result<Tenant> {
        let max_depth = input
            .max_depth
            .unwrap_or(crate::domain::tenant::DEFAULT_MAX_DEPTH)
            .clamp(crate::domain::tenant::MIN_MAX_DEPTH, 5);
        let tenant = Tenant::new_root(
            input.name.clone(),
            input.slug.clone(),
            input.tenant_type,
            max_depth,
        );
        let settings_json = serde_json::to_string(
            &input.settings.clone().unwrap_or_default(),
        )
        .map_err(|e| AppError::Internal(e.into()))?;
        let path_json =
            serde_json::to_string(&tenant.path.0).map_err(|e| AppError::Internal(e.into()))?;

        sqlx::query(
            r#"
            INSERT INTO tenants (id, parent_id, tenant_type, level, path, max_depth, slug, name, status, settings, created_at, updated_at)
            VALUES (?, NULL, ?, 0, ?, ?, ?, ?, 'active', ?, NOW(), NOW())
            "#,
        )
        .bind(tenant.id)
        .bind(tenant.tenant_type)
        .bind(&path_json)
        .bind(tenant.max_depth)
        .bind(&tenant.slug)
        .bind(&tenant.name)
        .bind(&settings_json)
        .execute(&self.pool)
        .await?;

        self.find_by_id(tenant.id.into())
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("failed to create tenant")))
    }

    async fn create_child(&self, parent: &Tenant, input: &CreateTenantInput) -> Result<Tenant> {
        if !parent.can_accept_child() {
            return Err(AppError::Conflict(
                "parent tenant cannot accept a child (archived or at max depth)".to_string(),
            ));
        }
        let id = StringUuid::new_v4();
        let mut path = parent.path.0.clone();
        path.push(id);
        let level = parent.level + 1;
        let settings_json = serde_json::to_string(
            &input.settings.clone().unwrap_or_default(),
        )
        .map_err(|e| AppError::Internal(e.into()))?;
        let path_json = serde_json::to_string(&path).map_err(|e| AppError::Internal(e.into()))?;

        sqlx::query(
            r#"
            INSERT INTO tenants (id, parent_id, tenant_type, level, path, max_depth, slug, name, status, settings, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'active', ?, NOW(), NOW())
            "#,
        )
        .bind(id)
        .bind(parent.id)
        .bind(input.tenant_type)
        .bind(level)
        .bind(&path_json)
        .bind(parent.max_depth)
        .bind(&input.slug)
        .bind(&input.name)
        .bind(&settings_json)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id.into())
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("failed to create tenant")))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Tenant>> {
        let query = format!("SELECT {} FROM tenants WHERE id = ?", Self::COLUMNS);
        Ok(sqlx::query_as::<_, Tenant>(&query)
            .bind(StringUuid::from(id))
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>> {
        let query = format!("SELECT {} FROM tenants WHERE slug = ?", Self::COLUMNS);
        Ok(sqlx::query_as::<_, Tenant>(&query)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_descendants(&self, ancestor_id: Uuid) -> Result<Vec<Tenant>> {
        // JSON_CONTAINS over the materialized path lets MySQL answer the
        // ancestor query without a recursive CTE.
        let query = format!(
            "SELECT {} FROM tenants WHERE JSON_CONTAINS(path, JSON_QUOTE(?)) ORDER BY level ASC",
            Self::COLUMNS
        );
        Ok(sqlx::query_as::<_, Tenant>(&query)
            .bind(StringUuid::from(ancestor_id).to_string())
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_children(&self, parent_id: Uuid) -> Result<Vec<Tenant>> {
        let query = format!(
            "SELECT {} FROM tenants WHERE parent_id = ? ORDER BY created_at ASC",
            Self::COLUMNS
        );
        Ok(sqlx::query_as::<_, Tenant>(&query)
            .bind(StringUuid::from(parent_id))
            .fetch_all(&self.pool)
            .await?)
    }

    async fn update(&self, id: Uuid, input: &UpdateTenantInput) -> Result<Tenant> {
        let existing = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("tenant {id} not found")))?;

        let name = input.name.as_ref().unwrap_or(&existing.name);
        let settings = input
            .settings
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| AppError::Internal(e.into()))?
            .unwrap_or_else(|| existing.settings.0.clone());
        let status = input.status.unwrap_or(existing.status);
        let settings_json =
            serde_json::to_string(&settings).map_err(|e| AppError::Internal(e.into()))?;

        sqlx::query(
            "UPDATE tenants SET name = ?, status = ?, settings = ?, updated_at = NOW() WHERE id = ?",
        )
        .bind(name)
        .bind(status)
        .bind(&settings_json)
        .bind(StringUuid::from(id))
        .execute(&self.pool)
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("failed to update tenant")))
    }

    async fn reparent(&self, id: Uuid, new_parent: &Tenant) -> Result<Tenant> {
        let node = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("tenant {id} not found")))?;
        if new_parent.has_ancestor(node.id) {
            return Err(AppError::Conflict(
                "cannot move a tenant under its own descendant".to_string(),
            ));
        }

        let descendants = self.find_descendants(id).await?;
        let old_prefix_len = node.path.0.len();
        let mut new_prefix = new_parent.path.0.clone();
        new_prefix.push(node.id);
        let level_delta = new_prefix.len() as i32 - old_prefix_len as i32;

        let mut tx = self.pool.begin().await?;
        for descendant in &descendants {
            let mut suffix = descendant.path.0[old_prefix_len - 1..].to_vec();
            suffix.remove(0);
            let mut rebuilt = new_prefix.clone();
            rebuilt.extend(suffix);
            let new_level = descendant.level + level_delta;
            let path_json =
                serde_json::to_string(&rebuilt).map_err(|e| AppError::Internal(e.into()))?;
            let new_parent_id = if descendant.id == node.id {
                new_parent.id
            } else {
                descendant.parent_id.unwrap_or(new_parent.id)
            };
            sqlx::query(
                "UPDATE tenants SET path = ?, level = ?, parent_id = ?, updated_at = NOW() WHERE id = ?",
            )
            .bind(&path_json)
            .bind(new_level)
            .bind(new_parent_id)
            .bind(descendant.id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("failed to reparent tenant")))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let descendants = self.find_descendants(id).await?;
        if descendants.len() > 1 {
            return Err(AppError::Conflict(
                "cannot delete a tenant with live descendants".to_string(),
            ));
        }
        let result = sqlx::query("DELETE FROM tenants WHERE id = ?")
            .bind(StringUuid::from(id))
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("tenant {id} not found")));
        }
        Ok(())
    }
}
