//! ABAC policy administration (spec.md §4.6): CRUD over tenant policies
//! plus the authorization-simulation endpoint, backed by the shared
//! `AuthorizationEngine`.

use crate::cache::CacheOperations;
use crate::domain::abac::{AuthorizeSimulationInput, CreatePolicyInput, Policy, UpdatePolicyInput};
use crate::domain::audit::{Actor, AuditEvent};
use crate::domain::common::StringUuid;
use crate::error::Result;
use crate::policy::{reject_script_conditions, AuthorizationEngine, AuthorizeDecision, AuthorizeRequest, BatchCheck};
use crate::repository::{AbacRepository, RbacRepository, TenantRepository};
use crate::service::audit::AuditSink;
use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;

pub struct AbacService<RB: RbacRepository, AB: AbacRepository, T: TenantRepository, C: CacheOperations> {
    repo: Arc<AB>,
    engine: Arc<AuthorizationEngine<RB, AB, T, C>>,
    audit: Arc<dyn AuditSink>,
}

impl<RB: RbacRepository, AB: AbacRepository, T: TenantRepository, C: CacheOperations> AbacService<RB, AB, T, C> {
    pub fn new(repo: Arc<AB>, engine: Arc<AuthorizationEngine<RB, AB, T, C>>, audit: Arc<dyn AuditSink>) -> Self {
        Self { repo, engine, audit }
    }

    pub async fn create(&self, input: CreatePolicyInput, actor: StringUuid) -> Result<Policy> {
        input.validate()?;
        reject_script_conditions(&input.conditions)?;
        let tenant_id = input.tenant_id;
        let policy = self.repo.create(&input).await?;
        self.engine.invalidate_tenant(tenant_id).await?;
        let _ = self
            .audit
            .record(
                AuditEvent::new(Actor::User { id: actor.into() }, "abac_policy.created", "abac_policy")
                    .with_tenant(tenant_id)
                    .with_target(policy.id.to_string()),
            )
            .await;
        Ok(policy)
    }

    pub async fn get(&self, id: StringUuid) -> Result<Policy> {
        self.repo
            .find_by_id(id.into())
            .await?
            .ok_or_else(|| crate::error::AppError::NotFound(format!("policy {id} not found")))
    }

    pub async fn list(&self, tenant_id: StringUuid) -> Result<Vec<Policy>> {
        self.repo.list_for_tenant(tenant_id.into()).await
    }

    pub async fn update(&self, id: StringUuid, input: UpdatePolicyInput, actor: StringUuid) -> Result<Policy> {
        input.validate()?;
        if let Some(conditions) = &input.conditions {
            reject_script_conditions(conditions)?;
        }
        let policy = self.repo.update(id.into(), &input).await?;
        self.engine.invalidate_tenant(policy.tenant_id.into()).await?;
        let _ = self
            .audit
            .record(
                AuditEvent::new(Actor::User { id: actor.into() }, "abac_policy.updated", "abac_policy")
                    .with_tenant(policy.tenant_id.into())
                    .with_target(id.to_string()),
            )
            .await;
        Ok(policy)
    }

    pub async fn delete(&self, id: StringUuid, actor: StringUuid) -> Result<()> {
        let policy = self.get(id).await?;
        self.repo.delete(id.into()).await?;
        self.engine.invalidate_tenant(policy.tenant_id.into()).await?;
        let _ = self
            .audit
            .record(
                AuditEvent::new(Actor::User { id: actor.into() }, "abac_policy.deleted", "abac_policy")
                    .with_tenant(policy.tenant_id.into())
                    .with_target(id.to_string()),
            )
            .await;
        Ok(())
    }

    pub async fn simulate(
        &self,
        tenant_id: StringUuid,
        user_id: StringUuid,
        input: AuthorizeSimulationInput,
    ) -> Result<AuthorizeDecision> {
        self.engine
            .simulate(&AuthorizeRequest {
                user_id,
                tenant_id,
                resource_type: input.resource_type,
                resource_id: input.resource_id,
                action: input.action,
                context: input.context,
            })
            .await
    }

    pub async fn authorize_many(
        &self,
        tenant_id: StringUuid,
        user_id: StringUuid,
        checks: Vec<BatchCheck>,
    ) -> Result<Vec<AuthorizeDecision>> {
        self.engine.authorize_many(user_id, tenant_id, checks).await
    }

    pub async fn permission_matrix(
        &self,
        tenant_id: StringUuid,
        user_id: StringUuid,
        resource_types: &[String],
    ) -> Result<HashMap<String, HashMap<String, bool>>> {
        self.engine.permission_matrix(user_id, tenant_id, resource_types).await
    }
}
