//! Role and permission-grant business logic (spec.md §4.6): role
//! definitions carry a set of `"resource:action"` patterns, permission
//! grants attach ad-hoc access to a single resource, and role assignments
//! bind a user to a role within a tenant.

use crate::cache::CacheOperations;
use crate::domain::audit::{Actor, AuditEvent};
use crate::domain::common::StringUuid;
use crate::domain::rbac::{
    AssignRoleInput, CreatePermissionGrantInput, CreateRoleInput, PermissionGrant, RoleDefinition,
    RoleSummary, UpdateRoleInput, UserRoleAssignment,
};
use crate::error::{AppError, Result};
use crate::policy::AuthorizationEngine;
use crate::repository::{AbacRepository, RbacRepository, TenantRepository};
use crate::service::audit::AuditSink;
use chrono::Utc;
use std::sync::Arc;
use validator::Validate;

pub struct RbacService<R: RbacRepository, AB: AbacRepository, T: TenantRepository, C: CacheOperations> {
    repo: Arc<R>,
    engine: Arc<AuthorizationEngine<R, AB, T, C>>,
    audit: Arc<dyn AuditSink>,
}

impl<R: RbacRepository, AB: AbacRepository, T: TenantRepository, C: CacheOperations> RbacService<R, AB, T, C> {
    pub fn new(repo: Arc<R>, engine: Arc<AuthorizationEngine<R, AB, T, C>>, audit: Arc<dyn AuditSink>) -> Self {
        Self { repo, engine, audit }
    }

    pub async fn create_role(&self, input: CreateRoleInput, actor: StringUuid) -> Result<RoleDefinition> {
        input.validate()?;
        if self.repo.find_role_by_name(input.tenant_id, &input.name).await?.is_some() {
            return Err(AppError::Conflict(format!("role '{}' already exists in tenant", input.name)));
        }
        let role = self.repo.create_role(&input).await?;
        self.engine.invalidate_tenant(input.tenant_id).await?;
        let _ = self
            .audit
            .record(
                AuditEvent::new(Actor::User { id: actor.into() }, "role.created", "role")
                    .with_tenant(input.tenant_id)
                    .with_target(role.id.to_string()),
            )
            .await;
        Ok(role)
    }

    pub async fn get_role(&self, id: StringUuid) -> Result<RoleDefinition> {
        self.repo
            .find_role_by_id(id.into())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role {id} not found")))
    }

    pub async fn list_roles(&self, tenant_id: StringUuid) -> Result<Vec<RoleSummary>> {
        let roles = self.repo.list_roles_for_tenant(tenant_id.into()).await?;
        let mut summaries = Vec::with_capacity(roles.len());
        for role in roles {
            let assignee_count = self.repo.count_assignees(role.id.into()).await?;
            summaries.push(RoleSummary { role, assignee_count });
        }
        Ok(summaries)
    }

    pub async fn update_role(&self, id: StringUuid, input: UpdateRoleInput) -> Result<RoleDefinition> {
        let role = self.repo.update_role(id.into(), &input).await?;
        self.engine.invalidate_tenant(role.tenant_id.into()).await?;
        Ok(role)
    }

    pub async fn delete_role(&self, id: StringUuid, actor: StringUuid) -> Result<()> {
        let role = self.get_role(id).await?;
        self.repo.delete_role(id.into()).await?;
        self.engine.invalidate_tenant(role.tenant_id.into()).await?;
        let _ = self
            .audit
            .record(
                AuditEvent::new(Actor::User { id: actor.into() }, "role.deleted", "role")
                    .with_tenant(role.tenant_id.into())
                    .with_target(id.to_string()),
            )
            .await;
        Ok(())
    }

    pub async fn assign_role(&self, input: AssignRoleInput, actor: StringUuid) -> Result<UserRoleAssignment> {
        let _ = self
            .repo
            .find_role_by_id(input.role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role {} not found", input.role_id)))?;

        let assignment = self.repo.assign_role(input.user_id, input.tenant_id, input.role_id, Some(actor.into())).await?;
        self.engine.invalidate_tenant(input.tenant_id).await?;
        let _ = self
            .audit
            .record(
                AuditEvent::new(Actor::User { id: actor.into() }, "role.assigned", "user_role_assignment")
                    .with_tenant(input.tenant_id)
                    .with_target(input.user_id.to_string()),
            )
            .await;
        Ok(assignment)
    }

    pub async fn unassign_role(&self, user_id: StringUuid, tenant_id: StringUuid, role_id: StringUuid, actor: StringUuid) -> Result<()> {
        self.repo.unassign_role(user_id.into(), tenant_id.into(), role_id.into()).await?;
        self.engine.invalidate_tenant(tenant_id.into()).await?;
        let _ = self
            .audit
            .record(
                AuditEvent::new(Actor::User { id: actor.into() }, "role.unassigned", "user_role_assignment")
                    .with_tenant(tenant_id.into())
                    .with_target(user_id.to_string()),
            )
            .await;
        Ok(())
    }

    pub async fn list_assignments_for_user(&self, user_id: StringUuid, tenant_id: StringUuid) -> Result<Vec<UserRoleAssignment>> {
        self.repo.list_assignments_for_user(user_id.into(), tenant_id.into()).await
    }

    pub async fn create_grant(&self, input: CreatePermissionGrantInput, actor: StringUuid) -> Result<PermissionGrant> {
        let grant = PermissionGrant {
            id: StringUuid::new_v4(),
            user_id: input.user_id.into(),
            tenant_id: input.tenant_id.into(),
            resource_type: input.resource_type.clone(),
            resource_id: input.resource_id.clone(),
            actions: sqlx::types::Json(input.actions.clone()),
            conditions: sqlx::types::Json(input.conditions.clone()),
            granted_by: actor,
            expires_at: input.expires_at,
            created_at: Utc::now(),
        };
        let grant = self.repo.create_grant(&grant).await?;
        self.engine.invalidate_tenant(input.tenant_id).await?;
        let _ = self
            .audit
            .record(
                AuditEvent::new(Actor::User { id: actor.into() }, "permission_grant.created", "permission_grant")
                    .with_tenant(input.tenant_id)
                    .with_target(grant.id.to_string()),
            )
            .await;
        Ok(grant)
    }

    pub async fn list_grants_for_user(&self, user_id: StringUuid, tenant_id: StringUuid) -> Result<Vec<PermissionGrant>> {
        self.repo.list_grants_for_user(user_id.into(), tenant_id.into()).await
    }

    /// Role names and flattened permission patterns to embed in a freshly
    /// issued access token: every role the user is assigned in this tenant,
    /// plus the resource-scoped patterns of any live direct grants.
    pub async fn effective_claims(&self, user_id: StringUuid, tenant_id: StringUuid) -> Result<(Vec<String>, Vec<String>)> {
        let assignments = self.list_assignments_for_user(user_id, tenant_id).await?;
        let mut roles = Vec::with_capacity(assignments.len());
        let mut permissions = Vec::new();
        for assignment in assignments {
            if let Some(role) = self.repo.find_role_by_id(assignment.role_id.into()).await? {
                roles.push(role.name.clone());
                permissions.extend(role.permission_patterns.0.iter().cloned());
            }
        }
        for grant in self.list_grants_for_user(user_id, tenant_id).await? {
            if !grant.is_live() {
                continue;
            }
            for action in &grant.actions.0 {
                permissions.push(format!("{}:{action}", grant.resource_type));
            }
        }
        Ok((roles, permissions))
    }

    pub async fn revoke_grant(&self, id: StringUuid, tenant_id: StringUuid, actor: StringUuid) -> Result<()> {
        self.repo.revoke_grant(id.into()).await?;
        self.engine.invalidate_tenant(tenant_id.into()).await?;
        let _ = self
            .audit
            .record(
                AuditEvent::new(Actor::User { id: actor.into() }, "permission_grant.revoked", "permission_grant")
                    .with_tenant(tenant_id.into())
                    .with_target(id.to_string()),
            )
            .await;
        Ok(())
    }
}
