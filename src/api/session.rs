//! Session management endpoints: a signed-in user manages their own
//! sessions directly; admins act on another user's sessions behind a
//! permission check.

use crate::api::{require_permission, MessageResponse, SuccessResponse};
use crate::domain::common::StringUuid;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn current_session_id(auth: &AuthUser) -> Result<StringUuid> {
    auth.jti
        .parse::<Uuid>()
        .map(StringUuid)
        .map_err(|_| AppError::Unauthenticated("invalid session token".to_string()))
}

/// `GET /sessions`: the caller's own active sessions.
pub async fn list_my_sessions(State(state): State<AppState>, auth: AuthUser) -> Result<impl IntoResponse> {
    let current = current_session_id(&auth)?;
    let sessions = state.session.list_sessions(StringUuid(auth.user_id), Some(current)).await?;
    Ok(Json(SuccessResponse::new(sessions)))
}

/// `DELETE /sessions/{id}`: revoke one of the caller's own sessions.
pub async fn revoke_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.session.revoke_session(StringUuid(session_id), StringUuid(auth.user_id)).await?;
    Ok(Json(MessageResponse::new("session revoked")))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RevokeSessionsResponse {
    pub revoked_count: u64,
}

/// `POST /sessions/revoke-others`: sign the caller out everywhere but here.
pub async fn revoke_other_sessions(State(state): State<AppState>, auth: AuthUser) -> Result<impl IntoResponse> {
    let current = current_session_id(&auth)?;
    let count = state.session.revoke_other_sessions(StringUuid(auth.user_id), current).await?;
    Ok(Json(SuccessResponse::new(RevokeSessionsResponse { revoked_count: count })))
}

/// `POST /admin/users/{id}/force-logout`
pub async fn force_logout_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let tenant_id = auth
        .tenant_id
        .ok_or_else(|| AppError::forbidden("tenant context required"))?;
    require_permission(&state, &auth, tenant_id, "session", Some(user_id.to_string()), "admin").await?;

    let count = state.session.force_logout_user(StringUuid(user_id), StringUuid(auth.user_id)).await?;
    Ok(Json(SuccessResponse::new(RevokeSessionsResponse { revoked_count: count })))
}
