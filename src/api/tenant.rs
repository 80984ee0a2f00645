//! Tenant tree endpoints: create, read, update, reparent, and delete nodes
//! in the multi-rooted materialized-path tenant tree.

use crate::api::{require_permission, MessageResponse, PaginationQuery, SuccessResponse};
use crate::domain::common::StringUuid;
use crate::domain::tenant::{CreateTenantInput, MoveTenantInput, UpdateTenantInput};
use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

/// `GET /tenants/{id}`
pub async fn get(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<impl IntoResponse> {
    let tenant = state.tenant.get(StringUuid(id)).await?;
    Ok(Json(SuccessResponse::new(tenant)))
}

/// `GET /tenants/by-slug/{slug}`
pub async fn get_by_slug(State(state): State<AppState>, Path(slug): Path<String>) -> Result<impl IntoResponse> {
    let tenant = state.tenant.get_by_slug(&slug).await?;
    Ok(Json(SuccessResponse::new(tenant)))
}

/// `GET /tenants/{id}/children`
pub async fn list_children(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<impl IntoResponse> {
    let children = state.tenant.list_children(StringUuid(id)).await?;
    Ok(Json(SuccessResponse::new(children)))
}

/// `GET /tenants/{id}/descendants`
pub async fn list_descendants(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(_pagination): Query<PaginationQuery>,
) -> Result<impl IntoResponse> {
    let descendants = state.tenant.list_descendants(StringUuid(id)).await?;
    Ok(Json(SuccessResponse::new(descendants)))
}

/// `POST /tenants`
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<CreateTenantInput>,
) -> Result<impl IntoResponse> {
    input.validate()?;
    let tenant = state.tenant.create(input, StringUuid(auth.user_id)).await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(tenant))))
}

/// `PATCH /tenants/{id}`
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateTenantInput>,
) -> Result<impl IntoResponse> {
    input.validate()?;
    require_permission(&state, &auth, id, "tenant", Some(id.to_string()), "write").await?;
    let tenant = state.tenant.update(StringUuid(id), input).await?;
    Ok(Json(SuccessResponse::new(tenant)))
}

/// `POST /tenants/reparent`
pub async fn reparent(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<MoveTenantInput>,
) -> Result<impl IntoResponse> {
    let tenant = state.tenant.reparent(input, StringUuid(auth.user_id)).await?;
    Ok(Json(SuccessResponse::new(tenant)))
}

/// `DELETE /tenants/{id}`
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    require_permission(&state, &auth, id, "tenant", Some(id.to_string()), "delete").await?;
    state.tenant.delete(StringUuid(id), StringUuid(auth.user_id)).await?;
    state.authorization_engine.invalidate_tenant(id).await?;
    Ok(Json(MessageResponse::new("tenant deleted")))
}
