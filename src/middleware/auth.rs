//! Bearer-token authentication extractor for protected REST routes.
//!
//! Validates the `Authorization: Bearer <access-token>` header against
//! [`JwtManager::verify_access_token`] and rejects tokens whose `jti` has been
//! revoked (logout, session termination) even though the token's own `exp`
//! has not yet elapsed.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::jwt::AccessClaims;
use crate::state::AppState;

/// Authenticated caller, extracted from a validated access token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub email_verified: bool,
    pub jti: String,
    pub tenant_id: Option<Uuid>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

impl AuthUser {
    fn from_claims(claims: AccessClaims) -> Result<Self, AuthError> {
        let user_id = claims.sub.parse().map_err(|_| AuthError::InvalidToken)?;
        let tenant_id = match claims.tenant_id {
            Some(t) => Some(t.parse().map_err(|_| AuthError::InvalidToken)?),
            None => None,
        };
        Ok(Self {
            user_id,
            email: claims.email,
            email_verified: claims.email_verified,
            jti: claims.jti,
            tenant_id,
            roles: claims.roles,
            permissions: claims.permissions,
        })
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn has_any_permission(&self, permissions: &[&str]) -> bool {
        permissions.iter().any(|p| self.has_permission(p))
    }

    pub fn has_all_permissions(&self, permissions: &[&str]) -> bool {
        permissions.iter().all(|p| self.has_permission(p))
    }
}

#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidHeader,
    InvalidToken,
    TokenExpired,
    Revoked,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingToken => "missing bearer token",
            AuthError::InvalidHeader => "malformed authorization header",
            AuthError::InvalidToken => "invalid token",
            AuthError::TokenExpired => "token expired",
            AuthError::Revoked => "token has been revoked",
        };
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": message, "code": "UNAUTHORIZED" })),
        )
            .into_response()
    }
}

pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?;
    let value = header.to_str().map_err(|_| AuthError::InvalidHeader)?;
    value.strip_prefix("Bearer ").ok_or(AuthError::InvalidHeader)
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)?;
        let claims = state
            .jwt_manager
            .verify_access_token(token)
            .map_err(|_| AuthError::InvalidToken)?;

        if state
            .cache
            .is_jti_revoked(&claims.jti)
            .await
            .map_err(|_| AuthError::TokenExpired)?
        {
            return Err(AuthError::Revoked);
        }

        AuthUser::from_claims(claims)
    }
}

/// Optional variant for endpoints that behave differently for anonymous callers.
pub struct OptionalAuth(pub Option<AuthUser>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(AuthUser::from_request_parts(parts, state).await.ok()))
    }
}
