//! Session store service (spec.md §4.2): enforces the concurrent-session
//! cap and keeps the Redis revocation set in sync with database revocation.

use crate::cache::CacheOperations;
use crate::domain::audit::{Actor, AuditEvent, Severity};
use crate::domain::session::{revocation_reason, CreateSessionInput, Session, SessionInfo, DEFAULT_MAX_SESSIONS_PER_USER};
use crate::domain::common::StringUuid;
use crate::error::{AppError, Result};
use crate::service::audit::AuditSink;
use std::sync::Arc;

use crate::repository::SessionRepository;

pub struct SessionService<S: SessionRepository, C: CacheOperations> {
    session_repo: Arc<S>,
    cache: Arc<C>,
    audit: Arc<dyn AuditSink>,
    max_sessions_per_user: i64,
}

impl<S: SessionRepository, C: CacheOperations> SessionService<S, C> {
    pub fn new(session_repo: Arc<S>, cache: Arc<C>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            session_repo,
            cache,
            audit,
            max_sessions_per_user: DEFAULT_MAX_SESSIONS_PER_USER,
        }
    }

    /// Create a session after a successful login, evicting the oldest live
    /// session first if the user is already at the concurrency cap.
    pub async fn create_session(&self, input: CreateSessionInput) -> Result<Session> {
        let active_count = self.session_repo.count_live_for_user(input.user_id).await?;
        if active_count >= self.max_sessions_per_user {
            if let Some(oldest) = self.session_repo.find_oldest_live_for_user(input.user_id).await? {
                let _ = self.session_repo.revoke(oldest.id, revocation_reason::SUPERSEDED).await;
                self.cache.revoke_jti(&oldest.id.to_string(), 60).await.ok();
                tracing::info!(
                    user_id = %input.user_id,
                    session_id = %oldest.id,
                    "evicted oldest session at concurrency cap"
                );
            }
        }

        self.session_repo.create(&input).await
    }

    pub async fn list_sessions(
        &self,
        user_id: StringUuid,
        current_session_id: Option<StringUuid>,
    ) -> Result<Vec<SessionInfo>> {
        let sessions = self.session_repo.list_live_for_user(user_id).await?;
        Ok(sessions
            .into_iter()
            .map(|s| {
                let mut info: SessionInfo = s.clone().into();
                if let Some(current) = current_session_id {
                    info.is_current = s.id == current;
                }
                info
            })
            .collect())
    }

    pub async fn revoke_session(&self, session_id: StringUuid, user_id: StringUuid) -> Result<()> {
        let session = self
            .session_repo
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound("session not found".to_string()))?;

        if session.user_id != user_id {
            return Err(AppError::forbidden("cannot revoke another user's session"));
        }

        self.session_repo.revoke(session_id, revocation_reason::LOGOUT).await?;
        self.cache.revoke_jti(&session_id.to_string(), 60).await?;

        let _ = self
            .audit
            .record(
                AuditEvent::new(Actor::User { id: user_id.into() }, "session.revoked", "session")
                    .with_target(session_id.to_string()),
            )
            .await;

        Ok(())
    }

    pub async fn revoke_other_sessions(
        &self,
        user_id: StringUuid,
        current_session_id: StringUuid,
    ) -> Result<u64> {
        let sessions = self.session_repo.list_live_for_user(user_id).await?;
        let mut revoked = 0u64;
        for session in sessions {
            if session.id == current_session_id {
                continue;
            }
            if self.session_repo.revoke(session.id, revocation_reason::LOGOUT).await.is_ok() {
                self.cache.revoke_jti(&session.id.to_string(), 60).await.ok();
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    /// Admin action: revoke every live session for a user (spec.md §4.2
    /// "force logout").
    pub async fn force_logout_user(&self, user_id: StringUuid, actor: StringUuid) -> Result<u64> {
        let sessions = self.session_repo.list_live_for_user(user_id).await?;
        for session in &sessions {
            self.cache.revoke_jti(&session.id.to_string(), 60).await.ok();
        }
        let revoked = self.session_repo.revoke_all_for_user(user_id, revocation_reason::ADMIN).await?;

        let _ = self
            .audit
            .record(
                AuditEvent::new(Actor::User { id: actor.into() }, "session.force_logout", "user")
                    .with_target(user_id.to_string())
                    .with_severity(Severity::Warning),
            )
            .await;

        Ok(revoked)
    }

    pub async fn touch(&self, session_id: StringUuid) -> Result<()> {
        self.session_repo.touch(session_id).await
    }

    /// Rotate a refresh token: create the replacement session, revoke the
    /// one being refreshed, and remember the mapping for a short grace
    /// window so a retried refresh request replays the same new session
    /// instead of minting another one or being rejected as reuse.
    pub async fn rotate(
        &self,
        old_session_id: StringUuid,
        new_session_input: CreateSessionInput,
    ) -> Result<Session> {
        if let Some(replayed) = self.cache.consume_refresh_rotation(&old_session_id.to_string()).await? {
            let new_session_id: StringUuid = replayed
                .parse()
                .map_err(|_| AppError::Internal(anyhow::anyhow!("corrupt refresh rotation cache entry")))?;
            if let Some(session) = self.session_repo.find_by_id(new_session_id).await? {
                return Ok(session);
            }
        }

        let old_session = self
            .session_repo
            .find_by_id(old_session_id)
            .await?
            .ok_or_else(|| AppError::Unauthenticated("refresh token not recognized".into()))?;
        if old_session.revoked_at.is_some() {
            return Err(AppError::Unauthenticated("refresh token already used".into()));
        }

        let new_session = self.session_repo.create(&new_session_input).await?;
        self.session_repo.revoke(old_session_id, revocation_reason::ROTATED).await?;
        self.cache.revoke_jti(&old_session_id.to_string(), 60).await.ok();
        self.cache
            .store_refresh_rotation(&old_session_id.to_string(), &new_session.id.to_string())
            .await
            .ok();

        Ok(new_session)
    }
}
