//! REST API handlers: thin transport over the service layer. Each handler
//! extracts/validates input, calls exactly one service method, and maps the
//! result to a response; authorization and business rules live in
//! `service`/`policy`, not here.

pub mod abac;
pub mod api_key;
pub mod audit;
pub mod auth;
pub mod health;
pub mod metrics;
pub mod rbac;
pub mod session;
pub mod tenant;
pub mod user;
pub mod webhook;

use crate::domain::common::StringUuid;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::policy::AuthorizeRequest;
use crate::state::AppState;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Pagination query parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaginationQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
}

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    20
}

impl PaginationQuery {
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1) * self.per_page.max(1)
    }
}

/// Paginated response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl<T: Serialize> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, page: i64, per_page: i64, total: i64) -> Self {
        let total_pages = (total as f64 / per_page.max(1) as f64).ceil() as i64;
        Self {
            data,
            pagination: PaginationMeta { page, per_page, total, total_pages },
        }
    }
}

/// Success response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse<T> {
    pub data: T,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Message response (for delete, etc.)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Ask the authorization engine whether `auth` may perform `action` on
/// `resource_type`/`resource_id` within `tenant_id`. Every handler that
/// mutates or reads tenant-scoped state outside its own user record should
/// call this before touching a service.
pub async fn require_permission(
    state: &AppState,
    auth: &AuthUser,
    tenant_id: Uuid,
    resource_type: &str,
    resource_id: Option<String>,
    action: &str,
) -> Result<()> {
    let req = AuthorizeRequest {
        user_id: StringUuid(auth.user_id),
        tenant_id: StringUuid(tenant_id),
        resource_type: resource_type.to_string(),
        resource_id,
        action: action.to_string(),
        context: Value::Null,
    };
    let decision = state.authorization_engine.authorize(&req).await?;
    if !decision.allowed {
        return Err(AppError::forbidden_with(
            format!("not permitted to {action} {resource_type}"),
            format!("{resource_type}:{action}"),
            decision.source,
        ));
    }
    Ok(())
}

pub(crate) fn extract_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get("x-forwarded-for") {
        if let Ok(forwarded) = value.to_str() {
            if let Some(first) = forwarded.split(',').next() {
                let trimmed = first.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
    }

    if let Some(value) = headers.get("x-real-ip") {
        if let Ok(real_ip) = value.to_str() {
            if !real_ip.trim().is_empty() {
                return Some(real_ip.trim().to_string());
            }
        }
    }

    None
}
