//! ABAC policy administration and the authorization-simulation endpoint.

use crate::api::{require_permission, MessageResponse, SuccessResponse};
use crate::domain::abac::{
    AuthorizeSimulationInput, BatchAuthorizeInput, CreatePolicyInput, PermissionMatrixInput, UpdatePolicyInput,
};
use crate::domain::common::StringUuid;
use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::policy::BatchCheck;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

/// `POST /tenants/{tenant_id}/policies`
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(tenant_id): Path<Uuid>,
    Json(input): Json<CreatePolicyInput>,
) -> Result<impl IntoResponse> {
    require_permission(&state, &auth, tenant_id, "abac_policy", None, "admin").await?;
    let policy = state.abac.create(input, StringUuid(auth.user_id)).await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(policy))))
}

/// `GET /policies/{id}`
pub async fn get(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<impl IntoResponse> {
    let policy = state.abac.get(StringUuid(id)).await?;
    Ok(Json(SuccessResponse::new(policy)))
}

/// `GET /tenants/{tenant_id}/policies`
pub async fn list(State(state): State<AppState>, Path(tenant_id): Path<Uuid>) -> Result<impl IntoResponse> {
    let policies = state.abac.list(StringUuid(tenant_id)).await?;
    Ok(Json(SuccessResponse::new(policies)))
}

/// `PATCH /tenants/{tenant_id}/policies/{id}`
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((tenant_id, id)): Path<(Uuid, Uuid)>,
    Json(input): Json<UpdatePolicyInput>,
) -> Result<impl IntoResponse> {
    input.validate()?;
    require_permission(&state, &auth, tenant_id, "abac_policy", Some(id.to_string()), "admin").await?;
    let policy = state.abac.update(StringUuid(id), input, StringUuid(auth.user_id)).await?;
    Ok(Json(SuccessResponse::new(policy)))
}

/// `DELETE /tenants/{tenant_id}/policies/{id}`
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((tenant_id, id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse> {
    require_permission(&state, &auth, tenant_id, "abac_policy", Some(id.to_string()), "admin").await?;
    state.abac.delete(StringUuid(id), StringUuid(auth.user_id)).await?;
    Ok(Json(MessageResponse::new("policy deleted")))
}

/// `POST /tenants/{tenant_id}/authorize/simulate`: dry-runs the full
/// RBAC + ABAC decision for a hypothetical request without caching it.
pub async fn simulate(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(tenant_id): Path<Uuid>,
    Json(input): Json<AuthorizeSimulationInput>,
) -> Result<impl IntoResponse> {
    require_permission(&state, &auth, tenant_id, "abac_policy", None, "read").await?;
    let result = state.abac.simulate(StringUuid(tenant_id), StringUuid(auth.user_id), input).await?;
    Ok(Json(SuccessResponse::new(result)))
}

/// `POST /tenants/{tenant_id}/authorize/many`: evaluates a batch of
/// authorization checks for the caller in one round trip (spec.md §4.6).
pub async fn authorize_many(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(tenant_id): Path<Uuid>,
    Json(input): Json<BatchAuthorizeInput>,
) -> Result<impl IntoResponse> {
    let checks = input
        .checks
        .into_iter()
        .map(|c| BatchCheck { resource_type: c.resource_type, resource_id: c.resource_id, action: c.action, context: c.context })
        .collect();
    let decisions = state
        .abac
        .authorize_many(StringUuid(tenant_id), StringUuid(auth.user_id), checks)
        .await?;
    Ok(Json(SuccessResponse::new(decisions)))
}

/// `POST /tenants/{tenant_id}/authorize/matrix`: composes a resource-type x
/// action truth table of the caller's own permissions (spec.md §4.6).
pub async fn permission_matrix(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(tenant_id): Path<Uuid>,
    Json(input): Json<PermissionMatrixInput>,
) -> Result<impl IntoResponse> {
    let matrix = state
        .abac
        .permission_matrix(StringUuid(tenant_id), StringUuid(auth.user_id), &input.resource_types)
        .await?;
    Ok(Json(SuccessResponse::new(matrix)))
}
