//! Audit trail query endpoint.

use crate::api::{require_permission, PaginatedResponse};
use crate::domain::common::StringUuid;
use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::repository::audit::AuditQuery;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

const DEFAULT_PAGE_SIZE: i64 = 50;

/// `GET /tenants/{tenant_id}/audit-events`
pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(tenant_id): Path<Uuid>,
    Query(mut query): Query<AuditQuery>,
) -> Result<impl IntoResponse> {
    require_permission(&state, &auth, tenant_id, "audit_event", None, "read").await?;
    query.tenant_id = Some(tenant_id);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0);
    query.limit = Some(limit);
    query.offset = Some(offset);

    let events = state.audit.find(&query).await?;
    let total = state.audit.count(&query).await?;
    let page = offset / limit.max(1) + 1;
    Ok(Json(PaginatedResponse::new(events, page, limit, total)))
}
