//! RBAC domain models: role definitions, direct permission grants, and the
//! user-role assignments that bind them to a tenant.

use super::common::StringUuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;
use validator::Validate;

/// Named permission bundle scoped to a tenant. Built-in roles
/// (owner/admin/member/viewer/guest) are seeded per tenant and carry
/// `immutable = true`; custom roles are tenant-authored.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoleDefinition {
    pub id: StringUuid,
    pub tenant_id: StringUuid,
    pub name: String,
    /// Patterns of the form "resource:action[,action...]" or "*:*".
    #[sqlx(json)]
    pub permission_patterns: Json<Vec<String>>,
    pub priority: i32,
    pub expiry_days: Option<i32>,
    pub immutable: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RoleDefinition {
    /// Permission patterns for the built-in roles, per spec.md §3.
    pub fn builtin_patterns(name: &str) -> Option<Vec<String>> {
        match name {
            "owner" | "admin" => Some(vec!["*:*".to_string()]),
            "member" => Some(vec!["*:write".to_string()]),
            "viewer" => Some(vec!["*:read".to_string()]),
            "guest" => Some(vec!["*:read".to_string()]),
            _ => None,
        }
    }

    /// Does this role's pattern set grant `action` on `resource_type`?
    pub fn matches(&self, resource_type: &str, action: &str) -> bool {
        self.permission_patterns
            .0
            .iter()
            .any(|pattern| pattern_matches(pattern, resource_type, action))
    }
}

/// Check a single "resource:action[,action...]" or "*:*" pattern against a
/// concrete resource type and action, honoring the action hierarchy.
pub fn pattern_matches(pattern: &str, resource_type: &str, action: &str) -> bool {
    let Some((res, actions)) = pattern.split_once(':') else {
        return false;
    };
    if res != "*" && res != resource_type {
        return false;
    }
    actions
        .split(',')
        .any(|a| a == "*" || super::common::action_implies(a.trim(), action))
}

/// Direct user→resource permission grant (bypasses role expansion).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PermissionGrant {
    pub id: StringUuid,
    pub user_id: StringUuid,
    pub tenant_id: StringUuid,
    pub resource_type: String,
    /// `None` means wildcard: any resource id of this type.
    pub resource_id: Option<String>,
    #[sqlx(json)]
    pub actions: Json<Vec<String>>,
    /// Structured ABAC conditions, evaluated the same way policy conditions
    /// are (see `policy::abac::ConditionNode`).
    #[sqlx(json)]
    pub conditions: Json<Option<Value>>,
    pub granted_by: StringUuid,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PermissionGrant {
    pub fn is_live(&self) -> bool {
        self.expires_at.map(|e| e > Utc::now()).unwrap_or(true)
    }

    pub fn covers(&self, resource_type: &str, resource_id: Option<&str>, action: &str) -> bool {
        if self.resource_type != resource_type {
            return false;
        }
        if let Some(grant_id) = &self.resource_id {
            if resource_id != Some(grant_id.as_str()) {
                return false;
            }
        }
        self.actions
            .0
            .iter()
            .any(|a| a == "*" || super::common::action_implies(a, action))
    }
}

/// Binds a user to a role definition within a tenant.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRoleAssignment {
    pub id: StringUuid,
    pub tenant_id: StringUuid,
    pub user_id: StringUuid,
    pub role_id: StringUuid,
    pub granted_at: DateTime<Utc>,
    pub granted_by: Option<StringUuid>,
}

/// Input for creating a role definition
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRoleInput {
    pub tenant_id: Uuid,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1))]
    pub permission_patterns: Vec<String>,
    #[serde(default)]
    pub priority: i32,
    pub expiry_days: Option<i32>,
}

/// Input for updating a role definition (immutable roles reject this)
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateRoleInput {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub permission_patterns: Option<Vec<String>>,
    pub priority: Option<i32>,
    pub expiry_days: Option<Option<i32>>,
}

/// Input for creating a direct permission grant
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePermissionGrantInput {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    #[validate(length(min = 1, max = 100))]
    pub resource_type: String,
    pub resource_id: Option<String>,
    #[validate(length(min = 1))]
    pub actions: Vec<String>,
    pub conditions: Option<Value>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Input for assigning a role to a user in a tenant
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AssignRoleInput {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role_id: Uuid,
}

/// Role with a resolved assignee count (for API responses)
#[derive(Debug, Clone, Serialize)]
pub struct RoleSummary {
    #[serde(flatten)]
    pub role: RoleDefinition,
    pub assignee_count: i64,
}
