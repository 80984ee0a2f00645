//! OAuth federation service (spec.md §4.3, §9): each identity provider is a
//! capability-set implementor of `OAuthProvider`, not a subclass hierarchy.
//! The service drives the authorize/callback round trip, persists linked
//! accounts with encrypted tokens, and performs account linking/unlinking.

use crate::cache::CacheOperations;
use crate::config::{EncryptionConfig, OAuthConfig, OAuthProviderConfig};
use crate::crypto::{self, EncryptionKey};
use crate::domain::common::StringUuid;
use crate::domain::oauth::{NormalizedProfile, OAuthProviderId, OAuthStateContext, RawTokenResponse};
use crate::domain::user::CreateUserInput;
use crate::error::{AppError, Result};
use crate::repository::{OAuthRepository, UserRepository};
use async_trait::async_trait;
use chrono::Utc;
use rand::RngCore;
use std::sync::Arc;

/// Capability set every federated identity provider implements. No shared
/// base class: each provider owns its own endpoint URLs and profile mapping.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    fn id(&self) -> OAuthProviderId;
    fn authorize_url(&self, state: &str, redirect_uri: &str, scopes: &[String]) -> String;
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<RawTokenResponse>;
    async fn fetch_profile(&self, access_token: &str) -> Result<NormalizedProfile>;
}

pub struct GithubProvider {
    client: reqwest::Client,
    config: OAuthProviderConfig,
}

impl GithubProvider {
    pub fn new(client: reqwest::Client, config: OAuthProviderConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl OAuthProvider for GithubProvider {
    fn id(&self) -> OAuthProviderId {
        OAuthProviderId::Github
    }

    fn authorize_url(&self, state: &str, redirect_uri: &str, scopes: &[String]) -> String {
        format!(
            "https://github.com/login/oauth/authorize?client_id={}&redirect_uri={}&scope={}&state={}",
            self.config.client_id,
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scopes.join(" ")),
            urlencoding::encode(state),
        )
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<RawTokenResponse> {
        let response = self
            .client
            .post("https://github.com/login/oauth/access_token")
            .header("Accept", "application/json")
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await
            .map_err(|e| AppError::ProviderError(format!("github token exchange failed: {e}")))?;

        response
            .json::<RawTokenResponse>()
            .await
            .map_err(|e| AppError::ProviderError(format!("github token response malformed: {e}")))
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<NormalizedProfile> {
        let raw: serde_json::Value = self
            .client
            .get("https://api.github.com/user")
            .bearer_auth(access_token)
            .header("User-Agent", "identkern")
            .send()
            .await
            .map_err(|e| AppError::ProviderError(format!("github profile fetch failed: {e}")))?
            .json()
            .await
            .map_err(|e| AppError::ProviderError(format!("github profile response malformed: {e}")))?;

        Ok(NormalizedProfile {
            id: raw.get("id").map(|v| v.to_string()).unwrap_or_default(),
            email: raw.get("email").and_then(|v| v.as_str()).map(String::from),
            email_verified: raw.get("email").and_then(|v| v.as_str()).is_some(),
            name: raw.get("name").and_then(|v| v.as_str()).map(String::from),
            picture: raw.get("avatar_url").and_then(|v| v.as_str()).map(String::from),
            raw,
        })
    }
}

pub struct GoogleProvider {
    client: reqwest::Client,
    config: OAuthProviderConfig,
}

impl GoogleProvider {
    pub fn new(client: reqwest::Client, config: OAuthProviderConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl OAuthProvider for GoogleProvider {
    fn id(&self) -> OAuthProviderId {
        OAuthProviderId::Google
    }

    fn authorize_url(&self, state: &str, redirect_uri: &str, scopes: &[String]) -> String {
        format!(
            "https://accounts.google.com/o/oauth2/v2/auth?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            self.config.client_id,
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scopes.join(" ")),
            urlencoding::encode(state),
        )
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<RawTokenResponse> {
        let response = self
            .client
            .post("https://oauth2.googleapis.com/token")
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::ProviderError(format!("google token exchange failed: {e}")))?;

        response
            .json::<RawTokenResponse>()
            .await
            .map_err(|e| AppError::ProviderError(format!("google token response malformed: {e}")))
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<NormalizedProfile> {
        let raw: serde_json::Value = self
            .client
            .get("https://www.googleapis.com/oauth2/v3/userinfo")
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::ProviderError(format!("google profile fetch failed: {e}")))?
            .json()
            .await
            .map_err(|e| AppError::ProviderError(format!("google profile response malformed: {e}")))?;

        Ok(NormalizedProfile {
            id: raw.get("sub").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            email: raw.get("email").and_then(|v| v.as_str()).map(String::from),
            email_verified: raw.get("email_verified").and_then(|v| v.as_bool()).unwrap_or(false),
            name: raw.get("name").and_then(|v| v.as_str()).map(String::from),
            picture: raw.get("picture").and_then(|v| v.as_str()).map(String::from),
            raw,
        })
    }
}

pub struct OAuthService<O: OAuthRepository, U: UserRepository, C: CacheOperations> {
    oauth_repo: Arc<O>,
    user_repo: Arc<U>,
    cache: Arc<C>,
    providers: Vec<Arc<dyn OAuthProvider>>,
    encryption_key: EncryptionKey,
    allowed_redirect_hosts: Vec<String>,
}

impl<O: OAuthRepository, U: UserRepository, C: CacheOperations> OAuthService<O, U, C> {
    pub fn new(
        oauth_repo: Arc<O>,
        user_repo: Arc<U>,
        cache: Arc<C>,
        providers: Vec<Arc<dyn OAuthProvider>>,
        oauth_config: &OAuthConfig,
        encryption_config: &EncryptionConfig,
    ) -> Self {
        Self {
            oauth_repo,
            user_repo,
            cache,
            providers,
            encryption_key: EncryptionKey::from_config_material(encryption_config.key_material.as_bytes()),
            allowed_redirect_hosts: oauth_config.allowed_redirect_hosts.clone(),
        }
    }

    fn provider(&self, id: OAuthProviderId) -> Result<&Arc<dyn OAuthProvider>> {
        self.providers
            .iter()
            .find(|p| p.id() == id)
            .ok_or_else(|| AppError::ConfigError(format!("oauth provider {id:?} not configured")))
    }

    fn validate_redirect(&self, final_redirect: &str) -> Result<()> {
        let url = url::Url::parse(final_redirect)
            .map_err(|_| AppError::Validation("invalid redirect url".to_string()))?;
        let host = url.host_str().unwrap_or_default();
        if !self.allowed_redirect_hosts.iter().any(|h| h == host) {
            return Err(AppError::Validation(format!("redirect host {host} is not allow-listed")));
        }
        Ok(())
    }

    /// Begin the authorize round trip: persists state in the KV store and
    /// returns the provider's authorize URL.
    pub async fn begin_authorize(
        &self,
        provider_id: OAuthProviderId,
        redirect_uri: &str,
        final_redirect: &str,
        linking_user_id: Option<StringUuid>,
        requested_scopes: Vec<String>,
    ) -> Result<String> {
        self.validate_redirect(final_redirect)?;
        let provider = self.provider(provider_id)?;

        let mut nonce_bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let state = hex::encode(nonce_bytes);

        let context = OAuthStateContext {
            provider: provider_id,
            tenant_id: None,
            linking_user_id,
            requested_scopes: requested_scopes.clone(),
            final_redirect: final_redirect.to_string(),
            nonce: state.clone(),
            expires_at: Utc::now() + chrono::Duration::minutes(10),
        };
        let context_json = serde_json::to_string(&context).map_err(|e| AppError::Internal(e.into()))?;
        self.cache.store_oauth_state(&state, &context_json).await?;

        Ok(provider.authorize_url(&state, redirect_uri, &requested_scopes))
    }

    /// Complete the callback: exchanges the code, fetches/normalizes the
    /// profile, and upserts the linked account. Returns the user id and
    /// original `final_redirect`.
    pub async fn complete_callback(
        &self,
        provider_id: OAuthProviderId,
        code: &str,
        state: &str,
        redirect_uri: &str,
    ) -> Result<(StringUuid, String)> {
        let context_json = self
            .cache
            .consume_oauth_state(state)
            .await?
            .ok_or_else(|| AppError::Unauthenticated("oauth state expired or unknown".to_string()))?;
        let context: OAuthStateContext =
            serde_json::from_str(&context_json).map_err(|e| AppError::Internal(e.into()))?;

        if context.provider != provider_id {
            return Err(AppError::Unauthenticated("oauth state provider mismatch".to_string()));
        }
        if context.expires_at < Utc::now() {
            return Err(AppError::Unauthenticated("oauth state expired".to_string()));
        }

        let provider = self.provider(provider_id)?;
        let token_response = provider.exchange_code(code, redirect_uri).await?;
        let profile = provider.fetch_profile(&token_response.access_token).await?;

        let encrypted_access_token = crypto::encrypt(&self.encryption_key, &token_response.access_token)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("token encryption failed: {e}")))?;
        let encrypted_refresh_token = token_response
            .refresh_token
            .as_deref()
            .map(|t| crypto::encrypt(&self.encryption_key, t))
            .transpose()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("token encryption failed: {e}")))?;
        let encrypted_id_token = token_response
            .id_token
            .as_deref()
            .map(|t| crypto::encrypt(&self.encryption_key, t))
            .transpose()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("token encryption failed: {e}")))?;
        let token_expires_at = token_response
            .expires_in
            .map(|secs| Utc::now() + chrono::Duration::seconds(secs));
        let scope: Vec<String> = token_response.scope.split(' ').filter(|s| !s.is_empty()).map(String::from).collect();

        let user_id = match context.linking_user_id {
            Some(existing) => existing,
            None => self.resolve_or_create_user(provider_id, &profile).await?,
        };

        self.oauth_repo
            .upsert(
                user_id.into(),
                provider_id,
                &profile.id,
                profile.email.as_deref(),
                &encrypted_access_token,
                encrypted_refresh_token.as_deref(),
                encrypted_id_token.as_deref(),
                token_expires_at,
                &scope,
                &profile.raw,
            )
            .await?;

        Ok((user_id, context.final_redirect))
    }

    async fn resolve_or_create_user(
        &self,
        provider_id: OAuthProviderId,
        profile: &NormalizedProfile,
    ) -> Result<StringUuid> {
        if let Some(provider_account) = self
            .oauth_repo
            .find_by_provider_account(provider_id, &profile.id)
            .await?
        {
            return Ok(provider_account.user_id);
        }

        if let Some(email) = &profile.email {
            if profile.email_verified {
                if let Some(user) = self.user_repo.find_by_email(email).await? {
                    return Ok(user.id);
                }
            }
        }

        let user = self
            .user_repo
            .create(&CreateUserInput {
                email: profile.email.clone().unwrap_or_default(),
                email_verified: profile.email_verified,
                display_name: profile.name.clone(),
                avatar_url: profile.picture.clone(),
                metadata: None,
            })
            .await?;
        Ok(user.id)
    }

    pub async fn list_linked_accounts(&self, user_id: StringUuid) -> Result<Vec<crate::domain::oauth::OAuthAccount>> {
        self.oauth_repo.list_for_user(user_id.into()).await
    }

    pub async fn unlink(&self, user_id: StringUuid, provider_id: OAuthProviderId) -> Result<()> {
        self.oauth_repo.unlink(user_id.into(), provider_id).await
    }
}
