//! User account and tenant-membership business logic (spec.md §4.2).

use crate::domain::audit::{Actor, AuditEvent};
use crate::domain::common::StringUuid;
use crate::domain::user::{AddTenantMemberInput, CreateUserInput, TenantMember, UpdateUserInput, User};
use crate::error::{AppError, Result};
use crate::repository::UserRepository;
use crate::service::audit::AuditSink;
use std::sync::Arc;
use validator::Validate;

pub struct UserService<R: UserRepository> {
    repo: Arc<R>,
    audit: Arc<dyn AuditSink>,
}

impl<R: UserRepository> UserService<R> {
    pub fn new(repo: Arc<R>, audit: Arc<dyn AuditSink>) -> Self {
        Self { repo, audit }
    }

    pub async fn create(&self, input: CreateUserInput) -> Result<User> {
        let normalized = User::normalize_email(&input.email);
        if self.repo.find_by_email(&normalized).await?.is_some() {
            return Err(AppError::Conflict(format!("user with email '{normalized}' already exists")));
        }
        self.repo.create(&CreateUserInput { email: normalized, ..input }).await
    }

    pub async fn get(&self, id: StringUuid) -> Result<User> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {id} not found")))
    }

    pub async fn get_by_email(&self, email: &str) -> Result<User> {
        self.repo
            .find_by_email(&User::normalize_email(email))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user '{email}' not found")))
    }

    pub async fn list(&self, offset: i64, limit: i64) -> Result<(Vec<User>, i64)> {
        let users = self.repo.list(offset, limit).await?;
        let total = self.repo.count().await?;
        Ok((users, total))
    }

    pub async fn update(&self, id: StringUuid, input: UpdateUserInput) -> Result<User> {
        input.validate()?;
        let _ = self.get(id).await?;
        self.repo.update(id, &input).await
    }

    pub async fn delete(&self, id: StringUuid, actor: StringUuid) -> Result<()> {
        let _ = self.get(id).await?;
        self.repo.delete(id).await?;
        let _ = self
            .audit
            .record(
                AuditEvent::new(Actor::User { id: actor.into() }, "user.deleted", "user")
                    .with_target(id.to_string()),
            )
            .await;
        Ok(())
    }

    pub async fn add_member(&self, input: AddTenantMemberInput, actor: StringUuid) -> Result<TenantMember> {
        if self
            .repo
            .find_member(input.tenant_id.into(), input.user_id.into())
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("user is already a member of this tenant".to_string()));
        }
        let tenant_id = input.tenant_id;
        let user_id = input.user_id;
        let member = self.repo.add_member(&input).await?;
        let _ = self
            .audit
            .record(
                AuditEvent::new(Actor::User { id: actor.into() }, "tenant_member.added", "tenant_member")
                    .with_tenant(tenant_id)
                    .with_target(user_id.to_string()),
            )
            .await;
        Ok(member)
    }

    pub async fn remove_member(&self, tenant_id: StringUuid, user_id: StringUuid, actor: StringUuid) -> Result<()> {
        self.repo.remove_member(tenant_id, user_id).await?;
        let _ = self
            .audit
            .record(
                AuditEvent::new(Actor::User { id: actor.into() }, "tenant_member.removed", "tenant_member")
                    .with_tenant(tenant_id.into())
                    .with_target(user_id.to_string()),
            )
            .await;
        Ok(())
    }

    pub async fn list_members(&self, tenant_id: StringUuid) -> Result<Vec<TenantMember>> {
        self.repo.list_members(tenant_id).await
    }

    pub async fn list_memberships(&self, user_id: StringUuid) -> Result<Vec<TenantMember>> {
        self.repo.list_memberships_for_user(user_id).await
    }
}
