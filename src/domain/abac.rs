//! ABAC policy domain models. The condition grammar itself (parsing and
//! evaluation) lives in `policy::abac`; this module holds the persisted
//! `Policy` entity and its API-facing input/summary types.

use super::common::StringUuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PolicyEffect {
    Allow,
    Deny,
}

/// ABAC rule scoped to a tenant (spec.md §3/§4.6).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Policy {
    pub id: StringUuid,
    pub tenant_id: StringUuid,
    pub name: String,
    pub effect: PolicyEffect,
    /// Each entry is "type", "type:id", or "*".
    #[sqlx(json)]
    pub resource_patterns: Json<Vec<String>>,
    #[sqlx(json)]
    pub actions: Json<Vec<String>>,
    /// A `ConditionNode` tree serialized as JSON; `None` means unconditional.
    #[sqlx(json)]
    pub conditions: Json<Option<Value>>,
    pub priority: i32,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Policy {
    pub fn matches_resource(&self, resource_type: &str, resource_id: Option<&str>) -> bool {
        self.resource_patterns.0.iter().any(|p| {
            if p == "*" {
                return true;
            }
            match p.split_once(':') {
                Some((t, id)) => t == resource_type && Some(id) == resource_id,
                None => p == resource_type,
            }
        })
    }

    pub fn covers_action(&self, action: &str) -> bool {
        self.actions
            .0
            .iter()
            .any(|a| a == "*" || super::common::action_implies(a, action))
    }
}

/// Input for creating a policy
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePolicyInput {
    pub tenant_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub effect: PolicyEffect,
    #[validate(length(min = 1))]
    pub resource_patterns: Vec<String>,
    #[validate(length(min = 1))]
    pub actions: Vec<String>,
    pub conditions: Option<Value>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Input for updating a policy
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdatePolicyInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub effect: Option<PolicyEffect>,
    pub resource_patterns: Option<Vec<String>>,
    pub actions: Option<Vec<String>>,
    pub conditions: Option<Option<Value>>,
    pub priority: Option<i32>,
    pub enabled: Option<bool>,
}

/// Input to the authorization-simulation endpoint (§4.6 testable properties)
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizeSimulationInput {
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    #[serde(default)]
    pub context: Value,
}

/// A single check within an `authorizeMany` request body (§4.6 "batch and
/// matrix operations"); `user`/`tenant` come from the request path/auth.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchAuthorizeCheckInput {
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    #[serde(default)]
    pub context: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchAuthorizeInput {
    pub checks: Vec<BatchAuthorizeCheckInput>,
}

/// Input to the permission-matrix endpoint: the resource types to compose
/// the truth table over.
#[derive(Debug, Clone, Deserialize)]
pub struct PermissionMatrixInput {
    pub resource_types: Vec<String>,
}
