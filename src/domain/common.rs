//! Common types and shared validation for domain models

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;
use validator::ValidationError;

/// Wrapper type for UUID stored as CHAR(36) in MySQL/TiDB
/// sqlx's uuid feature expects BINARY(16), but we use CHAR(36)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StringUuid(pub Uuid);

impl StringUuid {
    pub fn new_v4() -> Self {
        StringUuid(Uuid::new_v4())
    }

    pub fn nil() -> Self {
        StringUuid(Uuid::nil())
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Parse a UUID string
    pub fn parse_str(s: &str) -> Result<Self, uuid::Error> {
        Ok(StringUuid(Uuid::parse_str(s)?))
    }
}

impl From<Uuid> for StringUuid {
    fn from(uuid: Uuid) -> Self {
        StringUuid(uuid)
    }
}

impl From<StringUuid> for Uuid {
    fn from(s: StringUuid) -> Self {
        s.0
    }
}

impl std::ops::Deref for StringUuid {
    type Target = Uuid;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for StringUuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for StringUuid {
    type Err = uuid::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(StringUuid(Uuid::parse_str(s)?))
    }
}

impl sqlx::Type<sqlx::MySql> for StringUuid {
    fn type_info() -> sqlx::mysql::MySqlTypeInfo {
        <String as sqlx::Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &sqlx::mysql::MySqlTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::MySql>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::MySql> for StringUuid {
    fn decode(value: sqlx::mysql::MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::MySql>>::decode(value)?;
        let uuid = Uuid::parse_str(&s)?;
        Ok(StringUuid(uuid))
    }
}

impl<'q> sqlx::Encode<'q, sqlx::MySql> for StringUuid {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<u8>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <String as sqlx::Encode<sqlx::MySql>>::encode_by_ref(&self.0.to_string(), buf)
    }
}

/// Action hierarchy (spec.md §4.6): holding the parent action implies every
/// descendant action. `other` is an unrelated leaf action (delete, share,
/// invite, grant, revoke, ...) and only matches itself.
pub fn action_implies(held: &str, requested: &str) -> bool {
    if held == requested {
        return true;
    }
    let descendants: &[&str] = match held {
        "admin" => &["manage", "write", "read"],
        "manage" => &["write", "read"],
        "configure" => &["write", "read"],
        "upload" => &["write", "read"],
        "write" => &["read"],
        _ => &[],
    };
    descendants.contains(&requested)
}

/// Validate a URL against SSRF attacks.
/// Blocks cloud metadata endpoints, private/loopback IPs, and restricts HTTP to local networks.
pub fn validate_url_no_ssrf(url: &str) -> Result<(), ValidationError> {
    let parsed = Url::parse(url).map_err(|_| ValidationError::new("invalid_url"))?;

    let scheme = parsed.scheme();
    let host = parsed.host_str().unwrap_or("");

    // Only allow http and https schemes
    if scheme != "http" && scheme != "https" {
        return Err(ValidationError::new("invalid_scheme"));
    }

    // Block cloud metadata endpoints for ALL schemes
    let is_cloud_metadata = host == "169.254.169.254" || host == "metadata.google.internal";
    let is_loopback = host == "127.0.0.1" || host == "::1" || host == "0.0.0.0";
    let is_private = host.starts_with("192.168.")
        || host.starts_with("10.")
        || (host.starts_with("172.")
            && host
                .split('.')
                .nth(1)
                .and_then(|s| s.parse::<u8>().ok())
                .map(|n| (16..=31).contains(&n))
                .unwrap_or(false));

    if is_cloud_metadata {
        let mut err = ValidationError::new("ssrf_blocked");
        err.message = Some("Cloud metadata endpoints are not allowed".into());
        return Err(err);
    }

    // For HTTPS: allow external URLs, block private/loopback
    if scheme == "https" {
        if is_loopback || is_private {
            let mut err = ValidationError::new("internal_ip_blocked");
            err.message = Some("Internal IP addresses are not allowed".into());
            return Err(err);
        }
        return Ok(());
    }

    // HTTP only allowed for localhost/private networks (dev environment)
    if scheme == "http" {
        let is_localhost = host == "localhost" || host == "127.0.0.1" || host == "::1";
        if is_localhost || is_private {
            return Ok(());
        }

        let mut err = ValidationError::new("http_not_allowed");
        err.message = Some(
            "HTTP URLs are only allowed for localhost or private networks. Use HTTPS for external URLs.".into(),
        );
        return Err(err);
    }

    Err(ValidationError::new("invalid_scheme"))
}

/// Validate an optional URL against SSRF (for use with validator crate on Option<String> fields)
pub fn validate_url_no_ssrf_option(url: &str) -> Result<(), ValidationError> {
    validate_url_no_ssrf(url)
}

/// Strict URL validation that blocks ALL private/loopback IPs regardless of scheme.
/// Use for user-supplied URLs that will be stored and rendered (e.g. branding logos).
pub fn validate_url_no_ssrf_strict(url: &str) -> Result<(), ValidationError> {
    let parsed = Url::parse(url).map_err(|_| ValidationError::new("invalid_url"))?;

    let scheme = parsed.scheme();
    let host = parsed.host_str().unwrap_or("");

    // Only allow http and https schemes
    if scheme != "http" && scheme != "https" {
        return Err(ValidationError::new("invalid_scheme"));
    }

    let is_cloud_metadata = host == "169.254.169.254" || host == "metadata.google.internal";
    let is_loopback = host == "127.0.0.1"
        || host == "::1"
        || host == "0.0.0.0"
        || host == "localhost";
    let is_private = host.starts_with("192.168.")
        || host.starts_with("10.")
        || (host.starts_with("172.")
            && host
                .split('.')
                .nth(1)
                .and_then(|s| s.parse::<u8>().ok())
                .map(|n| (16..=31).contains(&n))
                .unwrap_or(false));

    if is_cloud_metadata {
        let mut err = ValidationError::new("ssrf_blocked");
        err.message = Some("Cloud metadata endpoints are not allowed".into());
        return Err(err);
    }

    if is_loopback || is_private {
        let mut err = ValidationError::new("internal_ip_blocked");
        err.message = Some("Internal IP addresses are not allowed".into());
        return Err(err);
    }

    // Block external HTTP (require HTTPS for external URLs)
    if scheme == "http" {
        let mut err = ValidationError::new("http_not_allowed");
        err.message = Some("Only HTTPS URLs are allowed".into());
        return Err(err);
    }

    Ok(())
}

/// Strict URL validation for optional fields
pub fn validate_url_no_ssrf_strict_option(url: &str) -> Result<(), ValidationError> {
    validate_url_no_ssrf_strict(url)
}
