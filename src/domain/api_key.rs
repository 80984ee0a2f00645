//! API-key domain model (spec.md §4.8): hashed machine credentials.

use super::common::StringUuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use validator::Validate;

/// Per-key throttling tier. Maps to concrete request budgets at the
/// rate-limit middleware, not stored as raw numbers here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RateLimitTier {
    Basic,
    Standard,
    Unbounded,
}

impl RateLimitTier {
    /// Requests per hour; `None` means unbounded.
    pub fn requests_per_hour(&self) -> Option<u32> {
        match self {
            RateLimitTier::Basic => Some(1_000),
            RateLimitTier::Standard => Some(10_000),
            RateLimitTier::Unbounded => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApiKey {
    pub id: StringUuid,
    pub service_account_id: StringUuid,
    pub tenant_id: StringUuid,
    pub name: String,
    /// Argon2id hash of the secret portion.
    pub hashed_secret: String,
    /// Recognizable literal identifying the deployment, e.g. `"sk_live"`.
    pub prefix: String,
    /// Key id used for O(1) lookup without scanning hashes.
    pub kid: String,
    #[sqlx(json)]
    pub permissions: Json<Vec<String>>,
    pub rate_limit_tier: RateLimitTier,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none() && self.expires_at.map(|e| e > Utc::now()).unwrap_or(true)
    }
}

/// Cleartext key material returned exactly once, at creation.
#[derive(Debug, Clone, Serialize)]
pub struct ApiKeyCreated {
    pub id: StringUuid,
    /// `{prefix}_{kid}_{secret}` — the only time the secret is visible.
    pub cleartext: String,
    pub prefix: String,
    pub kid: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateApiKeyInput {
    pub tenant_id: uuid::Uuid,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1))]
    pub permissions: Vec<String>,
    pub rate_limit_tier: RateLimitTier,
    pub expires_at: Option<DateTime<Utc>>,
}
