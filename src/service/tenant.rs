//! Tenant hierarchy business logic (spec.md §4.5): a multi-rooted tree of
//! tenants maintained via materialized paths, with owner/admin roles
//! cascading down to descendants.

use crate::domain::audit::{Actor, AuditEvent};
use crate::domain::common::StringUuid;
use crate::domain::tenant::{CreateTenantInput, MoveTenantInput, Tenant, UpdateTenantInput};
use crate::error::{AppError, Result};
use crate::repository::TenantRepository;
use crate::service::audit::AuditSink;
use std::sync::Arc;
use validator::Validate;

pub struct TenantService<R: TenantRepository> {
    repo: Arc<R>,
    audit: Arc<dyn AuditSink>,
}

impl<R: TenantRepository> TenantService<R> {
    pub fn new(repo: Arc<R>, audit: Arc<dyn AuditSink>) -> Self {
        Self { repo, audit }
    }

    pub async fn create(&self, input: CreateTenantInput, actor: StringUuid) -> Result<Tenant> {
        input.validate()?;

        if self.repo.find_by_slug(&input.slug).await?.is_some() {
            return Err(AppError::Conflict(format!("tenant with slug '{}' already exists", input.slug)));
        }

        let tenant = match input.parent_id {
            None => self.repo.create_root(&input).await?,
            Some(parent_id) => {
                let parent = self
                    .repo
                    .find_by_id(parent_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("parent tenant {parent_id} not found")))?;
                self.repo.create_child(&parent, &input).await?
            }
        };

        let _ = self
            .audit
            .record(
                AuditEvent::new(Actor::User { id: actor.into() }, "tenant.created", "tenant")
                    .with_tenant(tenant.id.into())
                    .with_target(tenant.id.to_string()),
            )
            .await;

        Ok(tenant)
    }

    pub async fn get(&self, id: StringUuid) -> Result<Tenant> {
        self.repo
            .find_by_id(id.into())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("tenant {id} not found")))
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Tenant> {
        self.repo
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("tenant '{slug}' not found")))
    }

    pub async fn list_children(&self, parent_id: StringUuid) -> Result<Vec<Tenant>> {
        self.repo.find_children(parent_id.into()).await
    }

    pub async fn list_descendants(&self, ancestor_id: StringUuid) -> Result<Vec<Tenant>> {
        self.repo.find_descendants(ancestor_id.into()).await
    }

    pub async fn update(&self, id: StringUuid, input: UpdateTenantInput) -> Result<Tenant> {
        input.validate()?;
        let _ = self.get(id).await?;
        self.repo.update(id.into(), &input).await
    }

    /// Move `tenant_id` (and its subtree) under `new_parent_id`. Rejects
    /// moves that would create a cycle (spec.md §4.5).
    pub async fn reparent(&self, input: MoveTenantInput, actor: StringUuid) -> Result<Tenant> {
        let new_parent = self
            .repo
            .find_by_id(input.new_parent_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("tenant {} not found", input.new_parent_id)))?;

        let tenant = self.repo.reparent(input.tenant_id, &new_parent).await?;

        let _ = self
            .audit
            .record(
                AuditEvent::new(Actor::User { id: actor.into() }, "tenant.reparented", "tenant")
                    .with_tenant(tenant.id.into())
                    .with_target(tenant.id.to_string()),
            )
            .await;

        Ok(tenant)
    }

    pub async fn delete(&self, id: StringUuid, actor: StringUuid) -> Result<()> {
        let _ = self.get(id).await?;
        self.repo.delete(id.into()).await?;

        let _ = self
            .audit
            .record(
                AuditEvent::new(Actor::User { id: actor.into() }, "tenant.deleted", "tenant")
                    .with_target(id.to_string()),
            )
            .await;

        Ok(())
    }
}
