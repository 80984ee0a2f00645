//! User account and tenant-membership endpoints.

use crate::api::{require_permission, MessageResponse, PaginatedResponse, PaginationQuery, SuccessResponse};
use crate::domain::common::StringUuid;
use crate::domain::user::{AddTenantMemberInput, CreateUserInput, UpdateUserInput};
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

/// `GET /users`
pub async fn list(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<impl IntoResponse> {
    let (users, total) = state.user.list(pagination.offset(), pagination.per_page).await?;
    Ok(Json(PaginatedResponse::new(users, pagination.page, pagination.per_page, total)))
}

/// `GET /users/{id}`
pub async fn get(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<impl IntoResponse> {
    let user = state.user.get(StringUuid(id)).await?;
    Ok(Json(SuccessResponse::new(user)))
}

/// `GET /users/me`
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> Result<impl IntoResponse> {
    let user = state.user.get(StringUuid(auth.user_id)).await?;
    Ok(Json(SuccessResponse::new(user)))
}

/// `POST /users`
pub async fn create(State(state): State<AppState>, Json(input): Json<CreateUserInput>) -> Result<impl IntoResponse> {
    input.validate()?;
    let user = state.user.create(input).await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(user))))
}

/// `PATCH /users/{id}`
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateUserInput>,
) -> Result<impl IntoResponse> {
    input.validate()?;
    let user = state.user.update(StringUuid(id), input).await?;
    Ok(Json(SuccessResponse::new(user)))
}

/// `DELETE /users/{id}`
pub async fn delete(State(state): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> Result<impl IntoResponse> {
    state.user.delete(StringUuid(id), StringUuid(auth.user_id)).await?;
    Ok(Json(MessageResponse::new("user deleted")))
}

/// `POST /tenants/{tenant_id}/members`
pub async fn add_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(tenant_id): Path<Uuid>,
    Json(input): Json<AddMemberRequest>,
) -> Result<impl IntoResponse> {
    require_permission(&state, &auth, tenant_id, "tenant_member", None, "write").await?;
    let member = state
        .user
        .add_member(
            AddTenantMemberInput {
                user_id: input.user_id,
                tenant_id,
                role: input.role,
                custom_role_name: input.custom_role_name,
                inherited_from: None,
            },
            StringUuid(auth.user_id),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(member))))
}

#[derive(Debug, serde::Deserialize)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
    pub role: crate::domain::user::TenantRole,
    pub custom_role_name: Option<String>,
}

/// `DELETE /tenants/{tenant_id}/members/{user_id}`
pub async fn remove_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((tenant_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse> {
    require_permission(&state, &auth, tenant_id, "tenant_member", Some(user_id.to_string()), "write").await?;
    state
        .user
        .remove_member(StringUuid(tenant_id), StringUuid(user_id), StringUuid(auth.user_id))
        .await?;
    Ok(Json(MessageResponse::new("member removed")))
}

/// `GET /tenants/{tenant_id}/members`
pub async fn list_members(State(state): State<AppState>, Path(tenant_id): Path<Uuid>) -> Result<impl IntoResponse> {
    let members = state.user.list_members(StringUuid(tenant_id)).await?;
    Ok(Json(SuccessResponse::new(members)))
}

/// `GET /users/{id}/memberships`
pub async fn list_memberships(State(state): State<AppState>, Path(user_id): Path<Uuid>) -> Result<impl IntoResponse> {
    let memberships = state.user.list_memberships(StringUuid(user_id)).await?;
    Ok(Json(SuccessResponse::new(memberships)))
}
