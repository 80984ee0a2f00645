//! Webhook endpoint CRUD, secret rotation, and one-off test delivery.

use crate::api::{require_permission, MessageResponse, SuccessResponse};
use crate::domain::common::StringUuid;
use crate::domain::webhook::{CreateWebhookInput, UpdateWebhookInput};
use crate::error::{AppError, Result};
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

async fn load_scoped(state: &AppState, tenant_id: Uuid, webhook_id: Uuid) -> Result<crate::domain::webhook::Webhook> {
    let webhook = state.webhook.get(StringUuid(webhook_id)).await?;
    if *webhook.tenant_id != tenant_id {
        return Err(AppError::NotFound(format!("webhook {webhook_id} not found")));
    }
    Ok(webhook)
}

/// `GET /tenants/{tenant_id}/webhooks`
pub async fn list(State(state): State<AppState>, Path(tenant_id): Path<Uuid>) -> Result<impl IntoResponse> {
    let webhooks = state.webhook.list_for_tenant(StringUuid(tenant_id)).await?;
    Ok(Json(SuccessResponse::new(webhooks)))
}

/// `GET /tenants/{tenant_id}/webhooks/{id}`
pub async fn get(
    State(state): State<AppState>,
    Path((tenant_id, webhook_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse> {
    let webhook = load_scoped(&state, tenant_id, webhook_id).await?;
    Ok(Json(SuccessResponse::new(webhook)))
}

/// `POST /tenants/{tenant_id}/webhooks`
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(tenant_id): Path<Uuid>,
    Json(input): Json<CreateWebhookInput>,
) -> Result<impl IntoResponse> {
    require_permission(&state, &auth, tenant_id, "webhook", None, "write").await?;
    let webhook = state.webhook.create(StringUuid(tenant_id), input).await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(webhook))))
}

/// `PATCH /tenants/{tenant_id}/webhooks/{id}`
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((tenant_id, webhook_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<UpdateWebhookInput>,
) -> Result<impl IntoResponse> {
    input.validate()?;
    require_permission(&state, &auth, tenant_id, "webhook", Some(webhook_id.to_string()), "write").await?;
    load_scoped(&state, tenant_id, webhook_id).await?;
    let webhook = state.webhook.update(StringUuid(webhook_id), input).await?;
    Ok(Json(SuccessResponse::new(webhook)))
}

/// `DELETE /tenants/{tenant_id}/webhooks/{id}`
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((tenant_id, webhook_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse> {
    require_permission(&state, &auth, tenant_id, "webhook", Some(webhook_id.to_string()), "delete").await?;
    load_scoped(&state, tenant_id, webhook_id).await?;
    state.webhook.delete(StringUuid(webhook_id)).await?;
    Ok(Json(MessageResponse::new("webhook deleted")))
}

/// `POST /tenants/{tenant_id}/webhooks/{id}/regenerate-secret`
pub async fn regenerate_secret(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((tenant_id, webhook_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse> {
    require_permission(&state, &auth, tenant_id, "webhook", Some(webhook_id.to_string()), "write").await?;
    load_scoped(&state, tenant_id, webhook_id).await?;
    let webhook = state.webhook.regenerate_secret(StringUuid(webhook_id)).await?;
    Ok(Json(SuccessResponse::new(webhook)))
}

/// `POST /tenants/{tenant_id}/webhooks/{id}/test`: sends a one-off test
/// event directly, bypassing the delivery queue.
pub async fn test(
    State(state): State<AppState>,
    Path((tenant_id, webhook_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse> {
    load_scoped(&state, tenant_id, webhook_id).await?;
    let result = state.webhook.test(StringUuid(webhook_id)).await?;
    Ok(Json(SuccessResponse::new(result)))
}
