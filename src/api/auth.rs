//! Authentication endpoints: magic-link sign-in, OAuth federation,
//! token refresh/logout, userinfo, and the JWKS document.

use crate::api::{extract_ip, MessageResponse, SuccessResponse};
use crate::domain::common::StringUuid;
use crate::domain::magic_link::{RequestMagicLinkInput, VerifyMagicLinkInput};
use crate::domain::oauth::OAuthProviderId;
use crate::domain::session::CreateSessionInput;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// `POST /auth/magic-link/request`
pub async fn request_magic_link(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<RequestMagicLinkInput>,
) -> Result<impl IntoResponse> {
    input.validate()?;
    let ip = extract_ip(&headers).unwrap_or_else(|| "unknown".to_string());
    state.magic_link.request(&input.email, &ip).await?;
    Ok(Json(MessageResponse::new(
        "if that address has an account, a sign-in link is on its way",
    )))
}

#[derive(Debug, Serialize)]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// `POST /auth/magic-link/verify`
pub async fn verify_magic_link(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<VerifyMagicLinkInput>,
) -> Result<impl IntoResponse> {
    input.validate()?;
    let user_id = state.magic_link.verify(&input.token).await?;
    let user = state.user.get(user_id).await?;
    let pair = issue_token_pair(&state, &headers, *user_id, &user.email, user.email_verified, None).await?;
    Ok(Json(pair.0))
}

#[derive(Debug, Deserialize)]
pub struct OAuthBeginQuery {
    pub redirect_uri: String,
    pub final_redirect: String,
}

/// `GET /auth/oauth/{provider}/start`
pub async fn oauth_begin(
    State(state): State<AppState>,
    Path(provider): Path<OAuthProviderId>,
    Query(query): Query<OAuthBeginQuery>,
) -> Result<impl IntoResponse> {
    let url = state
        .oauth
        .begin_authorize(provider, &query.redirect_uri, &query.final_redirect, None, vec![])
        .await?;
    Ok(Redirect::temporary(&url))
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: String,
    pub state: String,
    pub redirect_uri: String,
}

/// `GET /auth/oauth/{provider}/callback`
pub async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider): Path<OAuthProviderId>,
    Query(query): Query<OAuthCallbackQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let (user_id, final_redirect) = state
        .oauth
        .complete_callback(provider, &query.code, &query.state, &query.redirect_uri)
        .await?;
    let user = state.user.get(user_id).await?;
    let pair_response = issue_token_pair(&state, &headers, *user_id, &user.email, user.email_verified, None).await?;
    let pair = pair_response.0;
    let separator = if final_redirect.contains('?') { '&' } else { '?' };
    Ok(Redirect::temporary(&format!(
        "{final_redirect}{separator}access_token={}&refresh_token={}",
        pair.access_token, pair.refresh_token
    )))
}

/// `GET /auth/oauth/linked`
pub async fn list_linked_accounts(State(state): State<AppState>, auth: AuthUser) -> Result<impl IntoResponse> {
    let accounts = state.oauth.list_linked_accounts(StringUuid(auth.user_id)).await?;
    Ok(Json(SuccessResponse::new(accounts)))
}

/// `DELETE /auth/oauth/{provider}`
pub async fn unlink_account(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(provider): Path<OAuthProviderId>,
) -> Result<impl IntoResponse> {
    state.oauth.unlink(StringUuid(auth.user_id), provider).await?;
    Ok(Json(MessageResponse::new("account unlinked")))
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// `POST /auth/refresh`: rotates the session, revoking the old jti and
/// issuing a fresh pair.
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RefreshRequest>,
) -> Result<impl IntoResponse> {
    let claims = state.jwt_manager.verify_refresh_token(&body.refresh_token)?;
    let session_id: uuid::Uuid =
        claims.jti.parse().map_err(|_| AppError::Unauthenticated("invalid token".into()))?;
    let user_id: uuid::Uuid =
        claims.sub.parse().map_err(|_| AppError::Unauthenticated("invalid token".into()))?;
    let tenant_id = match claims.tenant_id {
        Some(ref t) => Some(t.parse().map_err(|_| AppError::Unauthenticated("invalid token".into()))?),
        None => None,
    };

    let user = state.user.get(StringUuid(user_id)).await?;
    let pair =
        issue_rotated_token_pair(&state, &headers, user_id, &user.email, user.email_verified, tenant_id, session_id)
            .await?;
    Ok(Json(pair.0))
}

/// `POST /auth/logout`
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> Result<impl IntoResponse> {
    let session_id: uuid::Uuid = auth.jti.parse().map_err(|_| AppError::Unauthenticated("invalid token".into()))?;
    state
        .session
        .revoke_session(StringUuid(session_id), StringUuid(auth.user_id))
        .await?;
    Ok(Json(MessageResponse::new("logged out")))
}

#[derive(Debug, Serialize)]
pub struct UserInfoResponse {
    pub sub: String,
    pub email: String,
    pub email_verified: bool,
    pub tenant_id: Option<String>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

/// `GET /auth/userinfo`
pub async fn userinfo(auth: AuthUser) -> Result<impl IntoResponse> {
    Ok(Json(UserInfoResponse {
        sub: auth.user_id.to_string(),
        email: auth.email,
        email_verified: auth.email_verified,
        tenant_id: auth.tenant_id.map(|t| t.to_string()),
        roles: auth.roles,
        permissions: auth.permissions,
    }))
}

#[derive(Debug, Serialize)]
pub struct JwksResponse {
    pub keys: Vec<serde_json::Value>,
}

/// `GET /.well-known/jwks.json`: only ever populated when the service
/// signs with RS256; HS256 deployments advertise an empty key set since
/// the symmetric secret must never be exposed.
pub async fn jwks(State(state): State<AppState>) -> impl IntoResponse {
    let keys = if state.jwt_manager.uses_rsa() {
        state
            .jwt_manager
            .public_key_pem()
            .map(|pem| vec![serde_json::json!({ "kty": "RSA", "use": "sig", "alg": "RS256", "pem": pem })])
            .unwrap_or_default()
    } else {
        Vec::new()
    };
    Json(JwksResponse { keys })
}

async fn issue_token_pair(
    state: &AppState,
    headers: &HeaderMap,
    user_id: uuid::Uuid,
    email: &str,
    email_verified: bool,
    tenant_id: Option<uuid::Uuid>,
) -> Result<(TokenPairResponse,)> {
    issue_token_pair_inner(state, headers, user_id, email, email_verified, tenant_id, None).await
}

/// Same as `issue_token_pair`, but rotates an existing refresh-token session
/// (`rotate_from`) instead of creating an unrelated new one. Rotation revokes
/// the old session and keeps a short-lived mapping so a retried refresh
/// within the grace window replays the same new session (spec.md §9's
/// refresh-rotation idempotency window) rather than erroring or piling up
/// extra sessions.
async fn issue_rotated_token_pair(
    state: &AppState,
    headers: &HeaderMap,
    user_id: uuid::Uuid,
    email: &str,
    email_verified: bool,
    tenant_id: Option<uuid::Uuid>,
    rotate_from: uuid::Uuid,
) -> Result<(TokenPairResponse,)> {
    issue_token_pair_inner(state, headers, user_id, email, email_verified, tenant_id, Some(rotate_from)).await
}

async fn issue_token_pair_inner(
    state: &AppState,
    headers: &HeaderMap,
    user_id: uuid::Uuid,
    email: &str,
    email_verified: bool,
    tenant_id: Option<uuid::Uuid>,
    rotate_from: Option<uuid::Uuid>,
) -> Result<(TokenPairResponse,)> {
    let (roles, permissions) = match tenant_id {
        Some(tid) => state.rbac.effective_claims(StringUuid(user_id), StringUuid(tid)).await?,
        None => (Vec::new(), Vec::new()),
    };

    let ip = extract_ip(headers);
    let user_agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let session_input = CreateSessionInput {
        user_id: StringUuid(user_id),
        tenant_id: tenant_id.map(StringUuid),
        device_fingerprint: None,
        ip_address: ip,
        user_agent,
        ttl: chrono::Duration::seconds(state.jwt_manager.access_token_ttl() * 4),
    };

    let session = match rotate_from {
        Some(old_session_id) => state.session.rotate(StringUuid(old_session_id), session_input).await?,
        None => state.session.create_session(session_input).await?,
    };

    let access_token = state.jwt_manager.create_access_token(
        *session.id,
        user_id,
        email,
        email_verified,
        tenant_id,
        roles,
        permissions,
    )?;
    let refresh_token = state.jwt_manager.create_refresh_token(*session.id, user_id, tenant_id)?;

    Ok((TokenPairResponse {
        access_token,
        refresh_token,
        token_type: "Bearer",
        expires_in: state.jwt_manager.access_token_ttl(),
    },))
}
