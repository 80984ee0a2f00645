//! Tenant domain model: a multi-rooted tree maintained via materialized paths.

use super::common::StringUuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use sqlx::types::Json;
use validator::Validate;

/// Default cap on tree depth when a root tenant doesn't specify one.
pub const DEFAULT_MAX_DEPTH: i32 = 5;
pub const MIN_MAX_DEPTH: i32 = 2;

/// Kind of node in the tree. Spec.md does not prescribe parent/child
/// constraints between types — any type may nest under any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TenantType {
    Workspace,
    Team,
    Project,
    Department,
    Division,
    Organization,
}

/// Tenant lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    #[default]
    Active,
    Suspended,
    Archived,
}

/// Tenant settings stored as JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantSettings {
    #[serde(default)]
    pub require_mfa: bool,
    #[serde(default)]
    pub allowed_auth_methods: Vec<String>,
    #[serde(default = "default_session_timeout")]
    pub session_timeout_secs: i64,
}

fn default_session_timeout() -> i64 {
    3600
}

impl Default for TenantSettings {
    fn default() -> Self {
        Self {
            require_mfa: false,
            allowed_auth_methods: Vec::new(),
            session_timeout_secs: default_session_timeout(),
        }
    }
}

/// Tenant entity: one node in a multi-rooted tree.
///
/// `path` is the ordered list of ancestor ids ending with `id` itself
/// (materialized path, spec.md §4.5/§9). `level` is `path.len() - 1`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    pub id: StringUuid,
    pub parent_id: Option<StringUuid>,
    pub tenant_type: TenantType,
    pub level: i32,
    #[sqlx(json)]
    pub path: Json<Vec<StringUuid>>,
    pub max_depth: i32,
    pub slug: String,
    pub name: String,
    pub status: TenantStatus,
    #[sqlx(json)]
    pub settings: Json<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    /// A fresh root node: path is just itself, level 0.
    pub fn new_root(
        name: String,
        slug: String,
        tenant_type: TenantType,
        max_depth: i32,
    ) -> Self {
        let id = StringUuid::new_v4();
        let now = Utc::now();
        Self {
            id,
            parent_id: None,
            tenant_type,
            level: 0,
            path: Json(vec![id]),
            max_depth: max_depth.clamp(MIN_MAX_DEPTH, 5),
            slug,
            name,
            status: TenantStatus::default(),
            settings: Json(serde_json::json!(TenantSettings::default())),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// True if `other` is an ancestor of (or equal to) this tenant.
    pub fn has_ancestor(&self, other: StringUuid) -> bool {
        self.path.0.contains(&other)
    }

    /// True if `descendant_path` represents a node under this tenant
    /// (containment check used by the repository's descendant query).
    pub fn contains_path(&self, descendant_path: &[StringUuid]) -> bool {
        descendant_path.len() > self.path.0.len()
            && descendant_path[..self.path.0.len()] == self.path.0[..]
    }

    pub fn can_accept_child(&self) -> bool {
        self.status != TenantStatus::Archived && self.level + 1 <= self.max_depth
    }
}

impl Default for Tenant {
    fn default() -> Self {
        Self::new_root(
            String::new(),
            String::new(),
            TenantType::Workspace,
            DEFAULT_MAX_DEPTH,
        )
    }
}

/// Input for creating a new tenant (root or child)
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTenantInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 63), custom(function = "validate_slug"))]
    pub slug: String,
    pub tenant_type: TenantType,
    pub parent_id: Option<uuid::Uuid>,
    /// Only honored when creating a root (no parent); children inherit the
    /// root's cap.
    pub max_depth: Option<i32>,
    pub settings: Option<TenantSettings>,
}

fn validate_slug(slug: &str) -> Result<(), validator::ValidationError> {
    if SLUG_REGEX.is_match(slug) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("invalid_slug"))
    }
}

/// Input for updating a tenant's mutable fields
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateTenantInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub settings: Option<TenantSettings>,
    pub status: Option<TenantStatus>,
}

/// Input for moving a tenant (and its subtree) under a new parent
#[derive(Debug, Clone, Deserialize)]
pub struct MoveTenantInput {
    pub tenant_id: uuid::Uuid,
    pub new_parent_id: uuid::Uuid,
}

lazy_static::lazy_static! {
    pub static ref SLUG_REGEX: regex::Regex = regex::Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();
}
