//! User and tenant-membership domain models

use super::common::StringUuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;
use validator::Validate;

/// Lifecycle status of a user account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Suspended,
    Blocked,
}

/// User entity. Created on first successful authentication (magic-link
/// verification or OAuth callback); never created directly by an API call.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: StringUuid,
    pub email: String,
    pub email_verified: bool,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub status: UserStatus,
    #[sqlx(json)]
    pub metadata: Json<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for User {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: StringUuid::new_v4(),
            email: String::new(),
            email_verified: false,
            display_name: None,
            avatar_url: None,
            status: UserStatus::default(),
            metadata: Json(Value::Object(Default::default())),
            created_at: now,
            updated_at: now,
        }
    }
}

impl User {
    /// Users are looked up case-insensitively by email; this is the
    /// canonical form stored and compared against.
    pub fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

/// Role a tenant-member holds. `Custom` defers to a named `Role Definition`
/// row rather than one of the built-ins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TenantRole {
    Owner,
    Admin,
    Member,
    Viewer,
    Guest,
    Custom,
}

impl TenantRole {
    /// Owner/admin roles are carried down to descendant tenants as
    /// inherited membership; the others are not (spec.md §4.5).
    pub fn is_inheritable(&self) -> bool {
        matches!(self, TenantRole::Owner | TenantRole::Admin)
    }
}

/// Directed edge from a user to a tenant: the user's membership and role.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TenantMember {
    pub id: StringUuid,
    pub tenant_id: StringUuid,
    pub user_id: StringUuid,
    pub role: TenantRole,
    /// Name of the custom role definition when `role == Custom`.
    pub custom_role_name: Option<String>,
    pub joined_at: DateTime<Utc>,
    /// Ancestor tenant whose inheritable role produced this membership, if any.
    pub inherited_from: Option<StringUuid>,
}

/// Input for creating a new user (first-login path, not a public endpoint)
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUserInput {
    #[validate(email)]
    pub email: String,
    /// True when the identity source already vouches for the address
    /// (magic-link verification, or an OAuth provider's verified-email claim).
    #[serde(default)]
    pub email_verified: bool,
    #[validate(length(max = 255))]
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub metadata: Option<Value>,
}

/// Input for updating a user
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateUserInput {
    #[validate(length(max = 255))]
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub status: Option<UserStatus>,
}

/// Input for adding a user to a tenant, directly or via inheritance cascade.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddTenantMemberInput {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role: TenantRole,
    pub custom_role_name: Option<String>,
    /// Set by the tenant hierarchy service when this membership was
    /// produced by an inheritable role cascading down from an ancestor.
    #[serde(default)]
    pub inherited_from: Option<Uuid>,
}

/// User with tenant memberships (for API responses)
#[derive(Debug, Clone, Serialize)]
pub struct UserWithTenants {
    #[serde(flatten)]
    pub user: User,
    pub tenants: Vec<UserTenantInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserTenantInfo {
    pub tenant_id: Uuid,
    pub tenant_name: String,
    pub role: TenantRole,
    pub inherited_from: Option<Uuid>,
    pub joined_at: DateTime<Utc>,
}
