//! Session domain model: the live bearer-token grant keyed by JTI.

use super::common::StringUuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Default concurrent-session cap per user (spec.md §3 — not the teacher's
/// default of 10).
pub const DEFAULT_MAX_SESSIONS_PER_USER: i64 = 5;

/// A live (or formerly live) bearer-token grant. `id` doubles as the jti
/// embedded in the corresponding access/refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: StringUuid,
    pub user_id: StringUuid,
    pub tenant_id: Option<StringUuid>,
    pub device_fingerprint: Option<String>,
    pub device_type: Option<String>,
    pub device_name: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revocation_reason: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: StringUuid::new_v4(),
            user_id: StringUuid::new_v4(),
            tenant_id: None,
            device_fingerprint: None,
            device_type: None,
            device_name: None,
            ip_address: None,
            user_agent: None,
            issued_at: now,
            last_used_at: now,
            expires_at: now + chrono::Duration::days(30),
            revoked_at: None,
            revocation_reason: None,
        }
    }
}

impl Session {
    pub fn is_live(&self) -> bool {
        self.revoked_at.is_none() && self.expires_at > Utc::now()
    }
}

/// Input for creating a new session
#[derive(Debug, Clone)]
pub struct CreateSessionInput {
    pub user_id: StringUuid,
    pub tenant_id: Option<StringUuid>,
    pub device_fingerprint: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub ttl: chrono::Duration,
}

/// Reasons a session was revoked; recorded for audit and diagnostics.
pub mod revocation_reason {
    pub const LOGOUT: &str = "logout";
    pub const ROTATED: &str = "rotated";
    pub const SUPERSEDED: &str = "superseded";
    pub const ADMIN: &str = "admin_revoked";
    pub const COMPROMISED: &str = "compromised";
}

/// Session info returned to clients (no internal fingerprint details)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub device_type: Option<String>,
    pub device_name: Option<String>,
    pub ip_address: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub is_current: bool,
}

impl From<Session> for SessionInfo {
    fn from(session: Session) -> Self {
        Self {
            id: session.id.to_string(),
            device_type: session.device_type,
            device_name: session.device_name,
            ip_address: session.ip_address,
            issued_at: session.issued_at,
            last_used_at: session.last_used_at,
            is_current: false,
        }
    }
}

/// Parse a user-agent string into a coarse device type/name pair, used to
/// populate `device_type`/`device_name` at session creation.
pub fn parse_user_agent(user_agent: &str) -> (Option<String>, Option<String>) {
    let ua = user_agent.to_lowercase();

    let device_type = if ua.contains("tablet") || ua.contains("ipad") {
        Some("tablet".to_string())
    } else if ua.contains("mobile") || (ua.contains("android") && !ua.contains("tablet")) {
        Some("mobile".to_string())
    } else {
        Some("desktop".to_string())
    };

    let device_name = if ua.contains("chrome") && !ua.contains("edg") {
        if ua.contains("android") {
            Some("Chrome on Android".to_string())
        } else if ua.contains("windows") {
            Some("Chrome on Windows".to_string())
        } else if ua.contains("mac") {
            Some("Chrome on macOS".to_string())
        } else if ua.contains("linux") {
            Some("Chrome on Linux".to_string())
        } else {
            Some("Chrome".to_string())
        }
    } else if ua.contains("firefox") {
        if ua.contains("android") {
            Some("Firefox on Android".to_string())
        } else if ua.contains("windows") {
            Some("Firefox on Windows".to_string())
        } else if ua.contains("mac") {
            Some("Firefox on macOS".to_string())
        } else if ua.contains("linux") {
            Some("Firefox on Linux".to_string())
        } else {
            Some("Firefox".to_string())
        }
    } else if ua.contains("safari") && !ua.contains("chrome") {
        if ua.contains("iphone") {
            Some("Safari on iPhone".to_string())
        } else if ua.contains("ipad") {
            Some("Safari on iPad".to_string())
        } else if ua.contains("mac") {
            Some("Safari on macOS".to_string())
        } else {
            Some("Safari".to_string())
        }
    } else if ua.contains("edg") {
        if ua.contains("windows") {
            Some("Edge on Windows".to_string())
        } else if ua.contains("mac") {
            Some("Edge on macOS".to_string())
        } else {
            Some("Edge".to_string())
        }
    } else {
        Some("Unknown Browser".to_string())
    };

    (device_type, device_name)
}
