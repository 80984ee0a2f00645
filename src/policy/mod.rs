//! Authorization engine (spec.md §4.6): combines role-based pattern
//! matching, direct permission grants, hierarchical role inheritance, and
//! attribute-based policies into a single allow/deny decision, with
//! deny-overrides-allow precedence and decision caching.

pub mod abac;

use crate::cache::CacheOperations;
use crate::domain::abac::PolicyEffect;
use crate::domain::common::StringUuid;
use crate::domain::rbac::PermissionGrant;
use crate::error::Result;
use crate::repository::{AbacRepository, RbacRepository, TenantRepository};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Action catalog used to compose a full resource×action truth table
/// (spec.md §4.6 "batch and matrix operations"). Mirrors the action
/// hierarchy: `admin ⊇ manage ⊇ write ⊇ read`; `configure ⊇ write ⊇ read`;
/// `upload ⊇ write`; the rest are leaves.
const ACTION_CATALOG: &[&str] =
    &["read", "write", "admin", "manage", "configure", "upload", "delete", "share", "invite", "grant", "revoke"];

/// What is being checked: who (`user_id`), where (`tenant_id`), and what
/// (`resource_type`/`resource_id`/`action`). `context` feeds the ABAC
/// condition evaluator as `subject.*`/`request.*`/`env.*` attributes.
#[derive(Debug, Clone)]
pub struct AuthorizeRequest {
    pub user_id: StringUuid,
    pub tenant_id: StringUuid,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub action: String,
    pub context: Value,
}

/// A single check within an `authorize_many` batch; `user`/`tenant` are
/// shared across the batch and supplied separately.
#[derive(Debug, Clone)]
pub struct BatchCheck {
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub action: String,
    pub context: Value,
}

/// Full authorization decision (spec.md §4.6: `{allowed, reason, source,
/// policiesEvaluated, expiresAt?, conditions?}`).
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizeDecision {
    pub allowed: bool,
    pub reason: String,
    /// One of `"grant"`, `"role"`, `"inherited"`, `"policy"`, `"default_deny"`.
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ancestor_id: Option<StringUuid>,
    pub policies_evaluated: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Value>,
}

impl AuthorizeDecision {
    fn allow(reason: impl Into<String>, source: &'static str) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
            source: source.to_string(),
            ancestor_id: None,
            policies_evaluated: Vec::new(),
            expires_at: None,
            conditions: None,
        }
    }

    fn deny(reason: impl Into<String>, source: &'static str) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            source: source.to_string(),
            ancestor_id: None,
            policies_evaluated: Vec::new(),
            expires_at: None,
            conditions: None,
        }
    }
}

fn cache_key(req: &AuthorizeRequest) -> String {
    format!(
        "{}:{}:{}:{}:{}",
        req.tenant_id,
        req.user_id,
        req.resource_type,
        req.resource_id.as_deref().unwrap_or("*"),
        req.action
    )
}

fn flatten_context(req: &AuthorizeRequest) -> abac::Context {
    let mut ctx: abac::Context = HashMap::new();
    ctx.insert("subject.user_id".to_string(), Value::String(req.user_id.to_string()));
    ctx.insert("subject.tenant_id".to_string(), Value::String(req.tenant_id.to_string()));
    ctx.insert("resource.type".to_string(), Value::String(req.resource_type.clone()));
    if let Some(id) = &req.resource_id {
        ctx.insert("resource.id".to_string(), Value::String(id.clone()));
    }
    if let Value::Object(map) = &req.context {
        for (k, v) in map {
            ctx.insert(k.clone(), v.clone());
        }
    }
    ctx
}

/// Reject conditions using a `script` predicate — spec.md §4.6 excludes a
/// scripting engine; this is enforced at policy write time.
pub fn reject_script_conditions(conditions: &Option<Value>) -> Result<()> {
    if let Some(raw) = conditions {
        if abac::contains_script_predicate(raw) {
            return Err(crate::error::AppError::Validation(
                "script conditions are not supported".to_string(),
            ));
        }
    }
    Ok(())
}

pub struct AuthorizationEngine<RB: RbacRepository, AB: AbacRepository, T: TenantRepository, C: CacheOperations> {
    rbac_repo: Arc<RB>,
    abac_repo: Arc<AB>,
    tenant_repo: Arc<T>,
    cache: Arc<C>,
}

impl<RB: RbacRepository, AB: AbacRepository, T: TenantRepository, C: CacheOperations> AuthorizationEngine<RB, AB, T, C> {
    pub fn new(rbac_repo: Arc<RB>, abac_repo: Arc<AB>, tenant_repo: Arc<T>, cache: Arc<C>) -> Self {
        Self { rbac_repo, abac_repo, tenant_repo, cache }
    }

    /// Step 1 of the decision tree: a live direct grant on (user, tenant,
    /// resource, action).
    async fn matching_grant(&self, req: &AuthorizeRequest) -> Result<Option<PermissionGrant>> {
        let grants = self
            .rbac_repo
            .list_grants_for_user(req.user_id.into(), req.tenant_id.into())
            .await?;
        Ok(grants
            .into_iter()
            .find(|g| g.is_live() && g.covers(&req.resource_type, req.resource_id.as_deref(), &req.action)))
    }

    /// Step 2 of the decision tree: the user's roles in `tenant_id` directly.
    async fn role_allows_in_tenant(&self, user_id: StringUuid, tenant_id: StringUuid, req: &AuthorizeRequest) -> Result<bool> {
        let assignments = self.rbac_repo.list_assignments_for_user(user_id.into(), tenant_id.into()).await?;
        for assignment in assignments {
            if let Some(role) = self.rbac_repo.find_role_by_id(assignment.role_id.into()).await? {
                if role.matches(&req.resource_type, &req.action) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Step 3 of the decision tree: walk `tenant_id`'s ancestors (nearest
    /// first) and re-check step 2 against any ancestor where the user holds
    /// an inheritable (owner/admin) role. Returns the ancestor id on the
    /// first allow.
    async fn find_inherited_allow(&self, req: &AuthorizeRequest) -> Result<Option<StringUuid>> {
        let Some(tenant) = self.tenant_repo.find_by_id(req.tenant_id.into()).await? else {
            return Ok(None);
        };
        let ancestors: Vec<StringUuid> = tenant.path.0.iter().rev().skip(1).copied().collect();

        for ancestor_id in ancestors {
            let assignments = self.rbac_repo.list_assignments_for_user(req.user_id.into(), ancestor_id.into()).await?;
            for assignment in assignments {
                if let Some(role) = self.rbac_repo.find_role_by_id(assignment.role_id.into()).await? {
                    let inheritable = matches!(role.name.as_str(), "owner" | "admin");
                    if inheritable && role.matches(&req.resource_type, &req.action) {
                        return Ok(Some(ancestor_id));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Step 4 of the decision tree: ABAC policies scoped to the tenant,
    /// returning the ids of matching allow and deny policies in priority
    /// order (highest first, per `AbacRepository`).
    async fn abac_matches(&self, req: &AuthorizeRequest) -> Result<(Vec<String>, Vec<String>)> {
        let policies = self.abac_repo.list_enabled_for_tenant(req.tenant_id.into()).await?;
        let ctx = flatten_context(req);
        let mut allow_ids = Vec::new();
        let mut deny_ids = Vec::new();

        for policy in &policies {
            if !policy.matches_resource(&req.resource_type, req.resource_id.as_deref()) {
                continue;
            }
            if !policy.covers_action(&req.action) {
                continue;
            }
            let condition_matches = match &policy.conditions.0 {
                Some(raw) => abac::eval_raw_condition(raw, &ctx),
                None => true,
            };
            if !condition_matches {
                continue;
            }
            match policy.effect {
                PolicyEffect::Allow => allow_ids.push(policy.id.to_string()),
                PolicyEffect::Deny => deny_ids.push(policy.id.to_string()),
            }
        }

        Ok((allow_ids, deny_ids))
    }

    /// Run the full decision tree (spec.md §4.6: grant, role, inherited
    /// role, ABAC policy, default deny) without touching the decision
    /// cache. Shared by `authorize` (which caches `allow`) and `simulate`
    /// (which never caches).
    async fn decide(&self, req: &AuthorizeRequest) -> Result<AuthorizeDecision> {
        if let Some(grant) = self.matching_grant(req).await? {
            let mut decision = AuthorizeDecision::allow("direct permission grant", "grant");
            decision.expires_at = grant.expires_at;
            return Ok(decision);
        }

        if self.role_allows_in_tenant(req.user_id, req.tenant_id, req).await? {
            return Ok(AuthorizeDecision::allow("role permission match", "role"));
        }

        if let Some(ancestor_id) = self.find_inherited_allow(req).await? {
            let mut decision = AuthorizeDecision::allow(
                "inherited owner/admin role from ancestor tenant",
                "inherited",
            );
            decision.ancestor_id = Some(ancestor_id);
            return Ok(decision);
        }

        let (allow_ids, deny_ids) = self.abac_matches(req).await?;
        let mut policies_evaluated = deny_ids.clone();
        policies_evaluated.extend(allow_ids.iter().cloned());

        if !deny_ids.is_empty() {
            let mut decision = AuthorizeDecision::deny("denied by policy", "policy");
            decision.policies_evaluated = policies_evaluated;
            return Ok(decision);
        }
        if !allow_ids.is_empty() {
            let mut decision = AuthorizeDecision::allow("allowed by policy", "policy");
            decision.policies_evaluated = policies_evaluated;
            return Ok(decision);
        }

        Ok(AuthorizeDecision::deny("no matching grant, role, or policy", "default_deny"))
    }

    /// Decide whether `req` is allowed. Deny overrides allow: any matching
    /// deny policy wins regardless of RBAC or allow policies. Only `true`
    /// decisions are cached, since grants/roles/policies can newly permit
    /// an action that was previously denied but a cached deny would not
    /// reflect that change without an explicit invalidation.
    pub async fn authorize(&self, req: &AuthorizeRequest) -> Result<AuthorizeDecision> {
        let key = cache_key(req);
        if let Some(true) = self.cache.get_authz_decision(&key).await? {
            return Ok(AuthorizeDecision::allow("cached decision", "cache"));
        }

        let decision = self.decide(req).await?;
        if decision.allowed {
            let _ = self.cache.set_authz_decision(&key, true).await;
        }
        Ok(decision)
    }

    /// Same evaluation as `authorize`, but never reads or writes the
    /// decision cache (spec.md §4.6 authorization-simulation endpoint).
    pub async fn simulate(&self, req: &AuthorizeRequest) -> Result<AuthorizeDecision> {
        self.decide(req).await
    }

    /// Evaluate a batch of checks for the same (user, tenant) (spec.md
    /// §4.6 `authorizeMany`).
    pub async fn authorize_many(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
        checks: Vec<BatchCheck>,
    ) -> Result<Vec<AuthorizeDecision>> {
        let mut results = Vec::with_capacity(checks.len());
        for check in checks {
            let req = AuthorizeRequest {
                user_id,
                tenant_id,
                resource_type: check.resource_type,
                resource_id: check.resource_id,
                action: check.action,
                context: check.context,
            };
            results.push(self.authorize(&req).await?);
        }
        Ok(results)
    }

    /// Compose the full resource×action truth table for (user, tenant)
    /// over `resource_types`, using the action catalog (spec.md §4.6
    /// `permissionMatrix`). Each cell agrees with what `authorize` would
    /// return for that same resource type and action.
    pub async fn permission_matrix(
        &self,
        user_id: StringUuid,
        tenant_id: StringUuid,
        resource_types: &[String],
    ) -> Result<HashMap<String, HashMap<String, bool>>> {
        let mut matrix = HashMap::with_capacity(resource_types.len());
        for resource_type in resource_types {
            let mut row = HashMap::with_capacity(ACTION_CATALOG.len());
            for action in ACTION_CATALOG {
                let req = AuthorizeRequest {
                    user_id,
                    tenant_id,
                    resource_type: resource_type.clone(),
                    resource_id: None,
                    action: action.to_string(),
                    context: Value::Null,
                };
                let decision = self.decide(&req).await?;
                row.insert(action.to_string(), decision.allowed);
            }
            matrix.insert(resource_type.clone(), row);
        }
        Ok(matrix)
    }

    pub async fn invalidate_tenant(&self, tenant_id: Uuid) -> Result<()> {
        self.cache.invalidate_authz_decisions_for_tenant(tenant_id).await
    }
}
