//! Magic-link domain model (spec.md §4.4): a short-lived, single-use
//! passwordless credential. The token carries enough entropy on its own
//! (256 random bits) that a fast deterministic digest is sufficient for
//! storage and O(1) lookup — no per-row salt is needed the way it is for
//! user-chosen passwords.

use super::common::StringUuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Maximum token lifetime (spec.md §3: "≤ 15 min").
pub const MAX_TTL_SECS: i64 = 15 * 60;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MagicLinkToken {
    pub id: StringUuid,
    pub token_hash: String,
    pub user_id: StringUuid,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl MagicLinkToken {
    pub fn is_consumable(&self) -> bool {
        self.consumed_at.is_none() && self.expires_at > Utc::now()
    }
}

/// Input for requesting a magic link
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RequestMagicLinkInput {
    #[validate(email)]
    pub email: String,
}

/// Input for verifying a magic link
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VerifyMagicLinkInput {
    #[validate(length(min = 1))]
    pub token: String,
}
