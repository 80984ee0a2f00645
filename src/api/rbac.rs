//! Role, permission-grant, and role-assignment administration endpoints.

use crate::api::{require_permission, MessageResponse, SuccessResponse};
use crate::domain::common::StringUuid;
use crate::domain::rbac::{AssignRoleInput, CreatePermissionGrantInput, CreateRoleInput, UpdateRoleInput};
use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

/// `POST /tenants/{tenant_id}/roles`
pub async fn create_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(tenant_id): Path<Uuid>,
    Json(input): Json<CreateRoleInput>,
) -> Result<impl IntoResponse> {
    require_permission(&state, &auth, tenant_id, "role", None, "admin").await?;
    let role = state.rbac.create_role(input, StringUuid(auth.user_id)).await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(role))))
}

/// `GET /roles/{id}`
pub async fn get_role(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<impl IntoResponse> {
    let role = state.rbac.get_role(StringUuid(id)).await?;
    Ok(Json(SuccessResponse::new(role)))
}

/// `GET /tenants/{tenant_id}/roles`
pub async fn list_roles(State(state): State<AppState>, Path(tenant_id): Path<Uuid>) -> Result<impl IntoResponse> {
    let roles = state.rbac.list_roles(StringUuid(tenant_id)).await?;
    Ok(Json(SuccessResponse::new(roles)))
}

/// `PATCH /roles/{id}`
pub async fn update_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((tenant_id, id)): Path<(Uuid, Uuid)>,
    Json(input): Json<UpdateRoleInput>,
) -> Result<impl IntoResponse> {
    input.validate()?;
    require_permission(&state, &auth, tenant_id, "role", Some(id.to_string()), "admin").await?;
    let role = state.rbac.update_role(StringUuid(id), input).await?;
    Ok(Json(SuccessResponse::new(role)))
}

/// `DELETE /tenants/{tenant_id}/roles/{id}`
pub async fn delete_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((tenant_id, id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse> {
    require_permission(&state, &auth, tenant_id, "role", Some(id.to_string()), "admin").await?;
    state.rbac.delete_role(StringUuid(id), StringUuid(auth.user_id)).await?;
    Ok(Json(MessageResponse::new("role deleted")))
}

/// `POST /tenants/{tenant_id}/role-assignments`
pub async fn assign_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(tenant_id): Path<Uuid>,
    Json(input): Json<AssignRoleInput>,
) -> Result<impl IntoResponse> {
    require_permission(&state, &auth, tenant_id, "role", Some(input.role_id.to_string()), "admin").await?;
    let assignment = state.rbac.assign_role(input, StringUuid(auth.user_id)).await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(assignment))))
}

/// `DELETE /tenants/{tenant_id}/users/{user_id}/roles/{role_id}`
pub async fn unassign_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((tenant_id, user_id, role_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<impl IntoResponse> {
    require_permission(&state, &auth, tenant_id, "role", Some(role_id.to_string()), "admin").await?;
    state
        .rbac
        .unassign_role(StringUuid(user_id), StringUuid(tenant_id), StringUuid(role_id), StringUuid(auth.user_id))
        .await?;
    Ok(Json(MessageResponse::new("role unassigned")))
}

/// `GET /tenants/{tenant_id}/users/{user_id}/roles`
pub async fn list_assignments(
    State(state): State<AppState>,
    Path((tenant_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse> {
    let assignments = state.rbac.list_assignments_for_user(StringUuid(user_id), StringUuid(tenant_id)).await?;
    Ok(Json(SuccessResponse::new(assignments)))
}

/// `POST /tenants/{tenant_id}/permission-grants`
pub async fn create_grant(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(tenant_id): Path<Uuid>,
    Json(input): Json<CreatePermissionGrantInput>,
) -> Result<impl IntoResponse> {
    require_permission(&state, &auth, tenant_id, "permission_grant", None, "admin").await?;
    let grant = state.rbac.create_grant(input, StringUuid(auth.user_id)).await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(grant))))
}

/// `GET /tenants/{tenant_id}/users/{user_id}/permission-grants`
pub async fn list_grants(
    State(state): State<AppState>,
    Path((tenant_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse> {
    let grants = state.rbac.list_grants_for_user(StringUuid(user_id), StringUuid(tenant_id)).await?;
    Ok(Json(SuccessResponse::new(grants)))
}

/// `DELETE /tenants/{tenant_id}/permission-grants/{id}`
pub async fn revoke_grant(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((tenant_id, id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse> {
    require_permission(&state, &auth, tenant_id, "permission_grant", Some(id.to_string()), "admin").await?;
    state.rbac.revoke_grant(StringUuid(id), StringUuid(tenant_id), StringUuid(auth.user_id)).await?;
    Ok(Json(MessageResponse::new("permission grant revoked")))
}
