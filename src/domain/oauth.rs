//! OAuth federation domain models (spec.md §4.3).

use super::common::StringUuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use sqlx::types::Json;

/// Identity providers the core federates with. Each is a capability-set
/// implementor of `OAuthProvider` (spec.md §9 "no shared base class"), not
/// a subclass hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OAuthProviderId {
    Github,
    Google,
    Apple,
    Microsoft,
}

impl OAuthProviderId {
    pub fn callback_path(&self) -> &'static str {
        match self {
            OAuthProviderId::Github => "github/callback",
            OAuthProviderId::Google => "google/callback",
            OAuthProviderId::Apple => "apple/callback",
            OAuthProviderId::Microsoft => "microsoft/callback",
        }
    }
}

/// Binding between an internal user and a provider identity.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OAuthAccount {
    pub id: StringUuid,
    pub user_id: StringUuid,
    pub provider: OAuthProviderId,
    pub provider_account_id: String,
    pub provider_email: Option<String>,
    /// base64url(nonce ‖ tag ‖ ciphertext), see `crypto::aes`.
    pub encrypted_access_token: String,
    pub encrypted_refresh_token: Option<String>,
    pub encrypted_id_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    #[sqlx(json)]
    pub scope: Json<Vec<String>>,
    #[sqlx(json)]
    pub profile_snapshot: Json<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Normalized profile every provider's `fetchProfile` must return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedProfile {
    pub id: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub raw: Value,
}

/// Raw token-response shape returned by `exchangeCode`/`refresh`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: String,
}

/// Ephemeral OAuth state context persisted in the KV store for the
/// duration of the redirect round-trip (spec.md §4.3/§9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthStateContext {
    pub provider: OAuthProviderId,
    pub tenant_id: Option<StringUuid>,
    /// Present when linking to an already-authenticated user; absent on login.
    pub linking_user_id: Option<StringUuid>,
    pub requested_scopes: Vec<String>,
    pub final_redirect: String,
    pub nonce: String,
    pub expires_at: DateTime<Utc>,
}
