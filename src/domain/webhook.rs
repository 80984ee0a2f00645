//! Webhook domain models (spec.md §4.7): an endpoint registration plus the
//! durable, retried deliveries queued against it.

use super::common::StringUuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use sqlx::types::Json;
use validator::Validate;

/// Base and cap for the exponential backoff curve (spec.md §4.7).
pub const RETRY_BASE_SECS: i64 = 2;
pub const RETRY_CAP_SECS: i64 = 30;
pub const DEFAULT_MAX_ATTEMPTS: i32 = 5;

/// `nextAttemptAt = now + min(base * 2^attempt, cap)`
pub fn backoff_delay_secs(attempt: u32) -> i64 {
    let scaled = RETRY_BASE_SECS.saturating_mul(2i64.saturating_pow(attempt));
    scaled.min(RETRY_CAP_SECS)
}

/// A registered webhook endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Webhook {
    pub id: StringUuid,
    pub tenant_id: StringUuid,
    pub name: String,
    pub url: String,
    /// base64url(nonce ‖ tag ‖ ciphertext) — HMAC secret, at-rest encrypted.
    pub secret: Option<String>,
    #[sqlx(json)]
    pub events: Json<Vec<String>>,
    pub enabled: bool,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub failure_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Webhook {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: StringUuid::new_v4(),
            tenant_id: StringUuid::new_v4(),
            name: String::new(),
            url: String::new(),
            secret: None,
            events: Json(Vec::new()),
            enabled: true,
            last_triggered_at: None,
            failure_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Delivery status (spec.md's shared credential/delivery state machine:
/// `pending -> delivering -> delivered|failed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Delivering,
    Delivered,
    Failed,
}

/// A queued webhook event, individually retried.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WebhookDelivery {
    pub id: StringUuid,
    pub webhook_id: StringUuid,
    pub url: String,
    pub event_type: String,
    #[sqlx(json)]
    pub payload: Json<Value>,
    pub attempt_count: i32,
    pub max_attempts: i32,
    pub next_attempt_at: DateTime<Utc>,
    pub status: DeliveryStatus,
    pub last_status_code: Option<i32>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WebhookDelivery {
    pub fn exhausted(&self) -> bool {
        self.attempt_count >= self.max_attempts
    }

    /// Advance to the next retry, or terminal `Failed` if attempts are exhausted.
    pub fn schedule_retry(&mut self, status_code: Option<i32>, error: impl Into<String>) {
        self.attempt_count += 1;
        self.last_status_code = status_code;
        self.last_error = Some(error.into());
        if self.exhausted() {
            self.status = DeliveryStatus::Failed;
        } else {
            self.status = DeliveryStatus::Pending;
            self.next_attempt_at =
                Utc::now() + chrono::Duration::seconds(backoff_delay_secs(self.attempt_count as u32));
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateWebhookInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(custom(function = "super::common::validate_url_no_ssrf"))]
    pub url: String,
    pub secret: Option<String>,
    #[validate(length(min = 1))]
    pub events: Vec<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateWebhookInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(custom(function = "super::common::validate_url_no_ssrf"))]
    pub url: Option<String>,
    pub secret: Option<String>,
    pub events: Option<Vec<String>>,
    pub enabled: Option<bool>,
}
