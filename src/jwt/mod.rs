//! JWT issuance and verification for the identity and access kernel.
//!
//! Every token carries a `jti` (the revocation unit — see `domain::session`)
//! and a `token_type` discriminator so access, refresh, and service-account
//! tokens cannot be confused for one another even if signed with the same key.

use crate::config::JwtConfig;
use crate::error::{AppError, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Clock skew tolerance applied to `exp`/`nbf` validation.
const CLOCK_SKEW_LEEWAY_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
    ServiceAccount,
}

impl TokenType {
    fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
            TokenType::ServiceAccount => "service_account",
        }
    }
}

/// Access token claims: scoped to a single tenant membership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user ID)
    pub sub: String,
    /// JWT ID: the revocation unit (matches the issuing session's id)
    pub jti: String,
    pub email: String,
    pub email_verified: bool,
    pub iss: String,
    pub aud: String,
    #[serde(default)]
    pub token_type: String,
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub jti: String,
    pub iss: String,
    pub aud: String,
    #[serde(default)]
    pub token_type: String,
    pub tenant_id: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

/// Service-account token claims, issued via API-key exchange (component C8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAccountClaims {
    pub sub: String,
    pub jti: String,
    pub iss: String,
    pub aud: String,
    #[serde(default)]
    pub token_type: String,
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub iat: i64,
    pub exp: i64,
}

/// JWT token manager: RS256 when a key pair is configured, HS256 otherwise.
#[derive(Clone)]
pub struct JwtManager {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    public_key_pem: Option<String>,
}

impl JwtManager {
    pub fn new(config: JwtConfig) -> Self {
        let algorithm = if config.private_key_pem.is_some() {
            Algorithm::RS256
        } else {
            Algorithm::HS256
        };
        let public_key_pem = config.public_key_pem.clone();
        let encoding_key = match config.private_key_pem.as_ref() {
            Some(private_key) => EncodingKey::from_rsa_pem(private_key.as_bytes())
                .expect("failed to load JWT private key"),
            None => EncodingKey::from_secret(config.secret.as_bytes()),
        };
        let decoding_key = match config.public_key_pem.as_ref() {
            Some(public_key) => DecodingKey::from_rsa_pem(public_key.as_bytes())
                .expect("failed to load JWT public key"),
            None => match config.private_key_pem.as_ref() {
                Some(private_key) => DecodingKey::from_rsa_pem(private_key.as_bytes())
                    .expect("failed to load JWT private key"),
                None => DecodingKey::from_secret(config.secret.as_bytes()),
            },
        };
        Self { config, encoding_key, decoding_key, algorithm, public_key_pem }
    }

    fn validation(&self) -> Validation {
        let mut v = Validation::new(self.algorithm);
        v.leeway = CLOCK_SKEW_LEEWAY_SECS;
        v
    }

    pub fn create_access_token(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        email: &str,
        email_verified: bool,
        tenant_id: Option<Uuid>,
        roles: Vec<String>,
        permissions: Vec<String>,
    ) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.config.access_token_ttl_secs);
        let claims = AccessClaims {
            sub: user_id.to_string(),
            jti: session_id.to_string(),
            email: email.to_string(),
            email_verified,
            iss: self.config.issuer.clone(),
            aud: "identity-kernel".to_string(),
            token_type: TokenType::Access.as_str().to_string(),
            tenant_id: tenant_id.map(|t| t.to_string()),
            roles,
            permissions,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };
        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(e.into()))
    }

    pub fn create_refresh_token(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        tenant_id: Option<Uuid>,
    ) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.config.refresh_token_ttl_secs);
        let claims = RefreshClaims {
            sub: user_id.to_string(),
            jti: session_id.to_string(),
            iss: self.config.issuer.clone(),
            aud: "identity-kernel".to_string(),
            token_type: TokenType::Refresh.as_str().to_string(),
            tenant_id: tenant_id.map(|t| t.to_string()),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };
        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(e.into()))
    }

    pub fn create_service_account_token(
        &self,
        key_id: Uuid,
        service_account_id: Uuid,
        tenant_id: Option<Uuid>,
        permissions: Vec<String>,
        ttl_secs: i64,
    ) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(ttl_secs);
        let claims = ServiceAccountClaims {
            sub: service_account_id.to_string(),
            jti: key_id.to_string(),
            iss: self.config.issuer.clone(),
            aud: "identity-kernel-service".to_string(),
            token_type: TokenType::ServiceAccount.as_str().to_string(),
            tenant_id: tenant_id.map(|t| t.to_string()),
            permissions,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };
        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(e.into()))
    }

    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims> {
        let mut validation = self.validation();
        validation.set_audience(&["identity-kernel"]);
        validation.set_issuer(&[&self.config.issuer]);
        let data = decode::<AccessClaims>(token, &self.decoding_key, &validation)?;
        if data.claims.token_type != TokenType::Access.as_str() {
            return Err(AppError::Unauthenticated("wrong token type".to_string()));
        }
        Ok(data.claims)
    }

    pub fn verify_refresh_token(&self, token: &str) -> Result<RefreshClaims> {
        let mut validation = self.validation();
        validation.set_audience(&["identity-kernel"]);
        validation.set_issuer(&[&self.config.issuer]);
        let data = decode::<RefreshClaims>(token, &self.decoding_key, &validation)?;
        if data.claims.token_type != TokenType::Refresh.as_str() {
            return Err(AppError::Unauthenticated("wrong token type".to_string()));
        }
        Ok(data.claims)
    }

    pub fn verify_service_account_token(&self, token: &str) -> Result<ServiceAccountClaims> {
        let mut validation = self.validation();
        validation.set_audience(&["identity-kernel-service"]);
        validation.set_issuer(&[&self.config.issuer]);
        let data = decode::<ServiceAccountClaims>(token, &self.decoding_key, &validation)?;
        if data.claims.token_type != TokenType::ServiceAccount.as_str() {
            return Err(AppError::Unauthenticated("wrong token type".to_string()));
        }
        Ok(data.claims)
    }

    pub fn access_token_ttl(&self) -> i64 {
        self.config.access_token_ttl_secs
    }

    pub fn uses_rsa(&self) -> bool {
        self.algorithm == Algorithm::RS256
    }

    pub fn public_key_pem(&self) -> Option<&str> {
        self.public_key_pem.as_deref()
    }
}
