//! Unified error handling for the identity and access kernel.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error taxonomy (spec.md §7 — kinds, not type names).
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Revoked: {0}")]
    Revoked(String),

    #[error("Forbidden: {0}")]
    Forbidden { message: String, required: Option<String>, source: Option<String> },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Throttled, retry after {retry_after_secs}s")]
    Throttled { retry_after_secs: u64 },

    #[error("Upstream provider error: {0}")]
    ProviderError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden { message: message.into(), required: None, source: None }
    }

    pub fn forbidden_with(
        message: impl Into<String>,
        required: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        AppError::Forbidden {
            message: message.into(),
            required: Some(required.into()),
            source: Some(source.into()),
        }
    }
}

/// Error response body: `{error, message, code, requestId}` (spec.md §7).
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    code: u16,
    #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
}

impl AppError {
    fn into_response_with_request_id(self, request_id: Option<String>) -> Response {
        let (status, error_type, message) = match &self {
            AppError::Unauthenticated(msg) => {
                (StatusCode::UNAUTHORIZED, "unauthenticated", msg.clone())
            }
            AppError::Revoked(msg) => (StatusCode::UNAUTHORIZED, "revoked", msg.clone()),
            AppError::Forbidden { message, .. } => {
                (StatusCode::FORBIDDEN, "forbidden", message.clone())
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "validation", msg.clone())
            }
            AppError::Throttled { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "throttled",
                "Rate limit exceeded".to_string(),
            ),
            AppError::ProviderError(msg) => {
                tracing::error!("provider error: {}", msg);
                (StatusCode::BAD_GATEWAY, "provider_error", "Upstream provider error".to_string())
            }
            AppError::ConfigError(msg) => {
                tracing::error!("config error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "config_error",
                    "Service misconfigured".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Redis(e) => {
                tracing::error!("redis error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "cache_error",
                    "A cache error occurred".to_string(),
                )
            }
            AppError::Jwt(e) => {
                tracing::warn!("jwt error: {:?}", e);
                (
                    StatusCode::UNAUTHORIZED,
                    "unauthenticated",
                    "Invalid or expired token".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let mut response = (
            status,
            Json(ErrorResponse {
                error: error_type.to_string(),
                message,
                code: status.as_u16(),
                request_id,
            }),
        )
            .into_response();

        if let AppError::Throttled { retry_after_secs } = &self {
            if let Ok(value) = retry_after_secs.to_string().parse() {
                response.headers_mut().insert(axum::http::header::RETRY_AFTER, value);
            }
        }

        response
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.into_response_with_request_id(None)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}
