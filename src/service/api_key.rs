//! Machine-credential service (spec.md §4.8): mints opaque `prefix_kid_secret`
//! API keys, storing only an Argon2id hash of the secret portion, and records
//! usage through the shared audit sink.

use crate::domain::api_key::{ApiKey, ApiKeyCreated, CreateApiKeyInput};
use crate::domain::audit::{Actor, AuditEvent};
use crate::domain::common::StringUuid;
use crate::error::{AppError, Result};
use crate::repository::ApiKeyRepository;
use crate::service::audit::AuditSink;
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::RngCore;
use std::sync::Arc;
use validator::Validate;

const KEY_PREFIX: &str = "sk_live";

pub struct ApiKeyService<R: ApiKeyRepository> {
    repo: Arc<R>,
    audit: Arc<dyn AuditSink>,
}

impl<R: ApiKeyRepository> ApiKeyService<R> {
    pub fn new(repo: Arc<R>, audit: Arc<dyn AuditSink>) -> Self {
        Self { repo, audit }
    }

    fn generate_kid() -> String {
        let mut bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    fn generate_secret() -> String {
        use base64::Engine;
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }

    fn hash_secret(secret: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(secret.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to hash api key secret: {e}")))
    }

    pub async fn create(
        &self,
        service_account_id: StringUuid,
        input: CreateApiKeyInput,
        actor: StringUuid,
    ) -> Result<ApiKeyCreated> {
        input.validate()?;
        let kid = Self::generate_kid();
        let secret = Self::generate_secret();
        let hashed = Self::hash_secret(&secret)?;

        let key = self
            .repo
            .create(
                service_account_id.into(),
                input.tenant_id,
                &input.name,
                &hashed,
                KEY_PREFIX,
                &kid,
                &input.permissions,
                input.rate_limit_tier,
                input.expires_at,
            )
            .await?;

        let _ = self
            .audit
            .record(
                AuditEvent::new(Actor::User { id: actor.into() }, "api_key.created", "api_key")
                    .with_tenant(input.tenant_id)
                    .with_target(key.id.to_string()),
            )
            .await;

        Ok(ApiKeyCreated {
            id: key.id,
            cleartext: format!("{KEY_PREFIX}_{kid}_{secret}"),
            prefix: KEY_PREFIX.to_string(),
            kid,
        })
    }

    pub async fn list_for_service_account(&self, service_account_id: StringUuid) -> Result<Vec<ApiKey>> {
        self.repo.list_for_service_account(service_account_id.into()).await
    }

    pub async fn revoke(&self, id: StringUuid, actor: StringUuid) -> Result<()> {
        self.repo.revoke(id.into()).await?;
        let _ = self
            .audit
            .record(
                AuditEvent::new(Actor::User { id: actor.into() }, "api_key.revoked", "api_key")
                    .with_target(id.to_string()),
            )
            .await;
        Ok(())
    }

    /// Verify a presented `prefix_kid_secret` key against its stored hash,
    /// returning the key record when it is live and the secret matches.
    pub async fn authenticate(&self, presented: &str) -> Result<ApiKey> {
        let rest = presented
            .strip_prefix(&format!("{KEY_PREFIX}_"))
            .ok_or_else(|| AppError::Unauthenticated("malformed api key".to_string()))?;
        let Some((kid, secret)) = rest.split_once('_') else {
            return Err(AppError::Unauthenticated("malformed api key".to_string()));
        };

        let key = self
            .repo
            .find_by_kid(kid)
            .await?
            .ok_or_else(|| AppError::Unauthenticated("invalid api key".to_string()))?;

        if !key.is_active() {
            return Err(AppError::Revoked("api key is revoked or expired".to_string()));
        }

        let hash = PasswordHash::new(&key.hashed_secret)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("corrupt api key hash: {e}")))?;
        Argon2::default()
            .verify_password(secret.as_bytes(), &hash)
            .map_err(|_| AppError::Unauthenticated("invalid api key".to_string()))?;

        Ok(key)
    }
}
