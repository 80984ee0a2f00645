//! Magic-link passwordless sign-in service (spec.md §4.4): issues a
//! random 256-bit token, stores only its Argon2id digest, and emails the
//! cleartext link once. Verification consumes the token exactly once.

use crate::cache::CacheOperations;
use crate::config::MagicLinkConfig;
use crate::domain::common::StringUuid;
use crate::domain::magic_link::MAX_TTL_SECS;
use crate::domain::user::CreateUserInput;
use crate::email::EmailSender;
use crate::error::{AppError, Result};
use crate::repository::{MagicLinkRepository, UserRepository};
use argon2::Argon2;
use base64::Engine;
use chrono::Utc;
use rand::RngCore;
use std::sync::Arc;

/// Fixed application-level salt for the token digest. The token itself
/// carries 256 bits of entropy, so a fixed salt trades per-hash
/// randomization for the equality-lookup the repository requires
/// ("look up by hash", spec.md §4.4) while still running the token
/// through Argon2id rather than a fast hash.
const MAGIC_LINK_SALT: &[u8] = b"identkern-magic-link-token-v1";

/// Requests allowed per IP per minute before a magic-link send is throttled
/// (spec.md §3: "5/min/IP").
const RATE_LIMIT_PER_MINUTE: u64 = 5;

pub struct MagicLinkService<M: MagicLinkRepository, U: UserRepository, C: CacheOperations, E: EmailSender> {
    magic_link_repo: Arc<M>,
    user_repo: Arc<U>,
    cache: Arc<C>,
    email: Arc<E>,
    config: MagicLinkConfig,
}

impl<M: MagicLinkRepository, U: UserRepository, C: CacheOperations, E: EmailSender>
    MagicLinkService<M, U, C, E>
{
    pub fn new(
        magic_link_repo: Arc<M>,
        user_repo: Arc<U>,
        cache: Arc<C>,
        email: Arc<E>,
        config: MagicLinkConfig,
    ) -> Self {
        Self { magic_link_repo, user_repo, cache, email, config }
    }

    fn generate_token() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }

    fn digest(token: &str) -> Result<String> {
        let mut out = [0u8; 32];
        Argon2::default()
            .hash_password_into(token.as_bytes(), MAGIC_LINK_SALT, &mut out)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to hash magic link token: {e}")))?;
        Ok(hex::encode(out))
    }

    /// Request a magic link for `email`. Always succeeds from the caller's
    /// perspective regardless of whether the address exists, to avoid
    /// leaking account existence (spec.md §4.4).
    pub async fn request(&self, email: &str, ip: &str) -> Result<()> {
        let bucket = format!("magic_link:{ip}");
        let count = self.cache.increment_rate_counter(&bucket, 60).await?;
        if count > RATE_LIMIT_PER_MINUTE {
            return Err(AppError::Throttled { retry_after_secs: 60 });
        }

        let normalized = crate::domain::user::User::normalize_email(email);
        let user = match self.user_repo.find_by_email(&normalized).await? {
            Some(user) => user,
            None => {
                self.user_repo
                    .create(&CreateUserInput {
                        email: normalized.clone(),
                        email_verified: false,
                        display_name: None,
                        avatar_url: None,
                        metadata: None,
                    })
                    .await?
            }
        };

        let token = Self::generate_token();
        let token_hash = Self::digest(&token)?;
        let ttl_secs = self.config.ttl_secs.min(MAX_TTL_SECS);
        let expires_at = Utc::now() + chrono::Duration::seconds(ttl_secs);

        self.magic_link_repo.create(user.id.into(), &token_hash, expires_at).await?;

        let link = format!("{}/auth/magic-link/verify?token={}", self.config.base_url, token);
        self.email
            .send(
                &normalized,
                "Sign in to your account",
                &format!("<p>Click <a href=\"{link}\">here</a> to sign in. This link expires in {} minutes.</p>", ttl_secs / 60),
                &format!("Sign in: {link}\n\nThis link expires in {} minutes.", ttl_secs / 60),
            )
            .await?;

        Ok(())
    }

    /// Verify a presented token, consuming it and returning the bound user id.
    pub async fn verify(&self, token: &str) -> Result<StringUuid> {
        let token_hash = Self::digest(token)?;
        let record = self
            .magic_link_repo
            .find_by_hash(&token_hash)
            .await?
            .ok_or_else(|| AppError::NotFound("magic link not found".to_string()))?;

        if record.consumed_at.is_some() {
            return Err(AppError::Validation("magic link already consumed".to_string()));
        }
        if record.expires_at <= Utc::now() {
            return Err(AppError::Validation("magic link expired".to_string()));
        }

        self.magic_link_repo.mark_consumed(record.id.into()).await?;
        Ok(record.user_id)
    }
}
