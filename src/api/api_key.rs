//! API-key administration endpoints: issuing and revoking machine
//! credentials for a tenant's service accounts.

use crate::api::{require_permission, MessageResponse, SuccessResponse};
use crate::domain::api_key::CreateApiKeyInput;
use crate::domain::common::StringUuid;
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

/// `POST /tenants/{tenant_id}/service-accounts/{service_account_id}/api-keys`
///
/// Returns the cleartext key exactly once; only its Argon2id hash is
/// ever persisted.
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((tenant_id, service_account_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<CreateApiKeyInput>,
) -> Result<impl IntoResponse> {
    require_permission(&state, &auth, tenant_id, "api_key", None, "admin").await?;
    let created = state
        .api_key
        .create(StringUuid(service_account_id), input, StringUuid(auth.user_id))
        .await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(created))))
}

/// `GET /tenants/{tenant_id}/service-accounts/{service_account_id}/api-keys`
pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((tenant_id, service_account_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse> {
    require_permission(&state, &auth, tenant_id, "api_key", None, "read").await?;
    let keys = state.api_key.list_for_service_account(StringUuid(service_account_id)).await?;
    Ok(Json(SuccessResponse::new(keys)))
}

/// `DELETE /tenants/{tenant_id}/api-keys/{id}`
pub async fn revoke(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((tenant_id, id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse> {
    require_permission(&state, &auth, tenant_id, "api_key", Some(id.to_string()), "admin").await?;
    state.api_key.revoke(StringUuid(id), StringUuid(auth.user_id)).await?;
    Ok(Json(MessageResponse::new("api key revoked")))
}
