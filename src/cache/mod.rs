//! Redis cache layer: revocation set, OAuth state, authorization-decision
//! cache, and rate-limit counters.

use crate::config::RedisConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use uuid::Uuid;

mod keys {
    pub const REVOKED_JTI: &str = "identkern:revoked_jti";
    pub const AUTHZ_DECISION: &str = "identkern:authz_decision";
    pub const OAUTH_STATE: &str = "identkern:oauth_state";
    pub const RATE_LIMIT: &str = "identkern:rate_limit";
    pub const WEBHOOK_DEDUP: &str = "identkern:webhook_dedup";
    pub const BLOCKED_IP: &str = "identkern:blocked_ip";
    pub const REFRESH_ROTATION: &str = "identkern:refresh_rotation";
}

mod ttl {
    /// Window during which a revoked jti must still be rejected even though
    /// the token itself would otherwise still validate (spec.md §5).
    pub const REVOCATION_SECS: u64 = 60;
    pub const AUTHZ_DECISION_SECS: u64 = 30;
    pub const OAUTH_STATE_SECS: u64 = 600;
    /// Grace window in which replaying an already-rotated refresh token
    /// returns the same new session instead of erroring, tolerating a
    /// client that retries a refresh request after a dropped response.
    pub const REFRESH_ROTATION_SECS: u64 = 10;
}

/// Cache operations trait for dependency injection and testing
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheOperations: Send + Sync {
    async fn ping(&self) -> Result<()>;

    /// Mark a jti as revoked, to be rejected even inside its token's own `exp`.
    async fn revoke_jti(&self, jti: &str, ttl_secs: u64) -> Result<()>;
    async fn is_jti_revoked(&self, jti: &str) -> Result<bool>;

    /// Cache an authorization decision keyed by (subject, resource, action).
    async fn get_authz_decision(&self, cache_key: &str) -> Result<Option<bool>>;
    async fn set_authz_decision(&self, cache_key: &str, allowed: bool) -> Result<()>;
    async fn invalidate_authz_decisions_for_tenant(&self, tenant_id: Uuid) -> Result<()>;

    /// Store/consume the signed OAuth `state` context across the redirect round trip.
    async fn store_oauth_state(&self, state: &str, context_json: &str) -> Result<()>;
    async fn consume_oauth_state(&self, state: &str) -> Result<Option<String>>;

    /// Sliding-window request counter for rate limiting; returns the count after incrementing.
    async fn increment_rate_counter(&self, bucket_key: &str, window_secs: u64) -> Result<u64>;

    /// Idempotency guard so a webhook event is not enqueued for delivery twice.
    async fn check_and_mark_webhook_event(&self, dedup_key: &str, ttl_secs: u64) -> Result<bool>;

    /// IP addresses temporarily blocked after repeated auth failures.
    async fn block_ip(&self, ip: &str, ttl_secs: u64) -> Result<()>;
    async fn is_ip_blocked(&self, ip: &str) -> Result<bool>;

    /// Record that `old_session_id`'s refresh token rotated into
    /// `new_session_id`, so a retried refresh within the grace window
    /// replays the same new session instead of minting another one.
    async fn store_refresh_rotation(&self, old_session_id: &str, new_session_id: &str) -> Result<()>;
    async fn consume_refresh_rotation(&self, old_session_id: &str) -> Result<Option<String>>;
}

/// Redis-backed implementation of [CacheOperations].
pub struct CacheManager {
    conn: ConnectionManager,
}

impl CacheManager {
    pub async fn new(config: &RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to create redis client: {e}")))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to connect to redis: {e}")))?;
        Ok(Self { conn })
    }

    pub fn get_connection_manager(&self) -> ConnectionManager {
        self.conn.clone()
    }

    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let start = std::time::Instant::now();
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        metrics::counter!("identkern_redis_operations_total", "operation" => "get").increment(1);
        metrics::histogram!("identkern_redis_operation_duration_seconds", "operation" => "get")
            .record(start.elapsed().as_secs_f64());
        match value {
            Some(v) => Ok(Some(serde_json::from_str(&v).map_err(|e| {
                AppError::Internal(anyhow::anyhow!("cache deserialize error: {e}"))
            })?)),
            None => Ok(None),
        }
    }

    async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let start = std::time::Instant::now();
        let mut conn = self.conn.clone();
        let serialized = serde_json::to_string(value)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("cache serialize error: {e}")))?;
        let _: () = conn.set_ex(key, serialized, ttl.as_secs()).await?;
        metrics::counter!("identkern_redis_operations_total", "operation" => "set").increment(1);
        metrics::histogram!("identkern_redis_operation_duration_seconds", "operation" => "set")
            .record(start.elapsed().as_secs_f64());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        metrics::counter!("identkern_redis_operations_total", "operation" => "del").increment(1);
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        loop {
            let (new_cursor, found): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;
            if !found.is_empty() {
                conn.del::<_, ()>(&found).await?;
            }
            cursor = new_cursor;
            if cursor == 0 {
                break;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CacheOperations for CacheManager {
    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn revoke_jti(&self, jti: &str, ttl_secs: u64) -> Result<()> {
        let key = format!("{}:{}", keys::REVOKED_JTI, jti);
        self.set(&key, &true, Duration::from_secs(ttl_secs.max(ttl::REVOCATION_SECS)))
            .await
    }

    async fn is_jti_revoked(&self, jti: &str) -> Result<bool> {
        let key = format!("{}:{}", keys::REVOKED_JTI, jti);
        Ok(self.get::<bool>(&key).await?.unwrap_or(false))
    }

    async fn get_authz_decision(&self, cache_key: &str) -> Result<Option<bool>> {
        let key = format!("{}:{}", keys::AUTHZ_DECISION, cache_key);
        self.get(&key).await
    }

    async fn set_authz_decision(&self, cache_key: &str, allowed: bool) -> Result<()> {
        let key = format!("{}:{}", keys::AUTHZ_DECISION, cache_key);
        self.set(&key, &allowed, Duration::from_secs(ttl::AUTHZ_DECISION_SECS)).await
    }

    async fn invalidate_authz_decisions_for_tenant(&self, tenant_id: Uuid) -> Result<()> {
        let pattern = format!("{}:{}:*", keys::AUTHZ_DECISION, tenant_id);
        self.delete_pattern(&pattern).await
    }

    async fn store_oauth_state(&self, state: &str, context_json: &str) -> Result<()> {
        let key = format!("{}:{}", keys::OAUTH_STATE, state);
        self.set(&key, &context_json, Duration::from_secs(ttl::OAUTH_STATE_SECS)).await
    }

    async fn consume_oauth_state(&self, state: &str) -> Result<Option<String>> {
        let key = format!("{}:{}", keys::OAUTH_STATE, state);
        let value = self.get::<String>(&key).await?;
        if value.is_some() {
            self.delete(&key).await?;
        }
        Ok(value)
    }

    async fn increment_rate_counter(&self, bucket_key: &str, window_secs: u64) -> Result<u64> {
        let key = format!("{}:{}", keys::RATE_LIMIT, bucket_key);
        let mut conn = self.conn.clone();
        let count: u64 = conn.incr(&key, 1).await?;
        if count == 1 {
            let _: () = conn.expire(&key, window_secs as i64).await?;
        }
        Ok(count)
    }

    async fn check_and_mark_webhook_event(&self, dedup_key: &str, ttl_secs: u64) -> Result<bool> {
        let key = format!("{}:{}", keys::WEBHOOK_DEDUP, dedup_key);
        let mut conn = self.conn.clone();
        let was_set: bool = redis::cmd("SET")
            .arg(&key)
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async::<_, Option<String>>(&mut conn)
            .await?
            .is_some();
        Ok(was_set)
    }

    async fn block_ip(&self, ip: &str, ttl_secs: u64) -> Result<()> {
        let key = format!("{}:{}", keys::BLOCKED_IP, ip);
        self.set(&key, &true, Duration::from_secs(ttl_secs)).await
    }

    async fn is_ip_blocked(&self, ip: &str) -> Result<bool> {
        let key = format!("{}:{}", keys::BLOCKED_IP, ip);
        Ok(self.get::<bool>(&key).await?.unwrap_or(false))
    }

    async fn store_refresh_rotation(&self, old_session_id: &str, new_session_id: &str) -> Result<()> {
        let key = format!("{}:{}", keys::REFRESH_ROTATION, old_session_id);
        self.set(&key, &new_session_id, Duration::from_secs(ttl::REFRESH_ROTATION_SECS)).await
    }

    async fn consume_refresh_rotation(&self, old_session_id: &str) -> Result<Option<String>> {
        let key = format!("{}:{}", keys::REFRESH_ROTATION, old_session_id);
        self.get::<String>(&key).await
    }
}

/// No-op cache used when Redis is unavailable in local/dev runs; every read
/// misses and every write succeeds silently.
#[derive(Default)]
pub struct NoOpCacheManager;

#[async_trait]
impl CacheOperations for NoOpCacheManager {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
    async fn revoke_jti(&self, _jti: &str, _ttl_secs: u64) -> Result<()> {
        Ok(())
    }
    async fn is_jti_revoked(&self, _jti: &str) -> Result<bool> {
        Ok(false)
    }
    async fn get_authz_decision(&self, _cache_key: &str) -> Result<Option<bool>> {
        Ok(None)
    }
    async fn set_authz_decision(&self, _cache_key: &str, _allowed: bool) -> Result<()> {
        Ok(())
    }
    async fn invalidate_authz_decisions_for_tenant(&self, _tenant_id: Uuid) -> Result<()> {
        Ok(())
    }
    async fn store_oauth_state(&self, _state: &str, _context_json: &str) -> Result<()> {
        Ok(())
    }
    async fn consume_oauth_state(&self, _state: &str) -> Result<Option<String>> {
        Ok(None)
    }
    async fn increment_rate_counter(&self, _bucket_key: &str, _window_secs: u64) -> Result<u64> {
        Ok(1)
    }
    async fn check_and_mark_webhook_event(&self, _dedup_key: &str, _ttl_secs: u64) -> Result<bool> {
        Ok(true)
    }
    async fn block_ip(&self, _ip: &str, _ttl_secs: u64) -> Result<()> {
        Ok(())
    }
    async fn is_ip_blocked(&self, _ip: &str) -> Result<bool> {
        Ok(false)
    }
    async fn store_refresh_rotation(&self, _old_session_id: &str, _new_session_id: &str) -> Result<()> {
        Ok(())
    }
    async fn consume_refresh_rotation(&self, _old_session_id: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Runtime cache strategy: Redis when reachable, a no-op fallback otherwise.
/// Generic service code (`SessionService<S, C: CacheOperations>`, the
/// `AuthorizationEngine`, ...) needs one concrete, `Sized` cache type rather
/// than a trait object, so the choice between the two backends is made here
/// instead of behind `dyn CacheOperations`.
pub enum AnyCache {
    Redis(CacheManager),
    NoOp(NoOpCacheManager),
}

#[async_trait]
impl CacheOperations for AnyCache {
    async fn ping(&self) -> Result<()> {
        match self {
            AnyCache::Redis(c) => c.ping().await,
            AnyCache::NoOp(c) => c.ping().await,
        }
    }
    async fn revoke_jti(&self, jti: &str, ttl_secs: u64) -> Result<()> {
        match self {
            AnyCache::Redis(c) => c.revoke_jti(jti, ttl_secs).await,
            AnyCache::NoOp(c) => c.revoke_jti(jti, ttl_secs).await,
        }
    }
    async fn is_jti_revoked(&self, jti: &str) -> Result<bool> {
        match self {
            AnyCache::Redis(c) => c.is_jti_revoked(jti).await,
            AnyCache::NoOp(c) => c.is_jti_revoked(jti).await,
        }
    }
    async fn get_authz_decision(&self, cache_key: &str) -> Result<Option<bool>> {
        match self {
            AnyCache::Redis(c) => c.get_authz_decision(cache_key).await,
            AnyCache::NoOp(c) => c.get_authz_decision(cache_key).await,
        }
    }
    async fn set_authz_decision(&self, cache_key: &str, allowed: bool) -> Result<()> {
        match self {
            AnyCache::Redis(c) => c.set_authz_decision(cache_key, allowed).await,
            AnyCache::NoOp(c) => c.set_authz_decision(cache_key, allowed).await,
        }
    }
    async fn invalidate_authz_decisions_for_tenant(&self, tenant_id: Uuid) -> Result<()> {
        match self {
            AnyCache::Redis(c) => c.invalidate_authz_decisions_for_tenant(tenant_id).await,
            AnyCache::NoOp(c) => c.invalidate_authz_decisions_for_tenant(tenant_id).await,
        }
    }
    async fn store_oauth_state(&self, state: &str, context_json: &str) -> Result<()> {
        match self {
            AnyCache::Redis(c) => c.store_oauth_state(state, context_json).await,
            AnyCache::NoOp(c) => c.store_oauth_state(state, context_json).await,
        }
    }
    async fn consume_oauth_state(&self, state: &str) -> Result<Option<String>> {
        match self {
            AnyCache::Redis(c) => c.consume_oauth_state(state).await,
            AnyCache::NoOp(c) => c.consume_oauth_state(state).await,
        }
    }
    async fn increment_rate_counter(&self, bucket_key: &str, window_secs: u64) -> Result<u64> {
        match self {
            AnyCache::Redis(c) => c.increment_rate_counter(bucket_key, window_secs).await,
            AnyCache::NoOp(c) => c.increment_rate_counter(bucket_key, window_secs).await,
        }
    }
    async fn check_and_mark_webhook_event(&self, dedup_key: &str, ttl_secs: u64) -> Result<bool> {
        match self {
            AnyCache::Redis(c) => c.check_and_mark_webhook_event(dedup_key, ttl_secs).await,
            AnyCache::NoOp(c) => c.check_and_mark_webhook_event(dedup_key, ttl_secs).await,
        }
    }
    async fn block_ip(&self, ip: &str, ttl_secs: u64) -> Result<()> {
        match self {
            AnyCache::Redis(c) => c.block_ip(ip, ttl_secs).await,
            AnyCache::NoOp(c) => c.block_ip(ip, ttl_secs).await,
        }
    }
    async fn is_ip_blocked(&self, ip: &str) -> Result<bool> {
        match self {
            AnyCache::Redis(c) => c.is_ip_blocked(ip).await,
            AnyCache::NoOp(c) => c.is_ip_blocked(ip).await,
        }
    }
    async fn store_refresh_rotation(&self, old_session_id: &str, new_session_id: &str) -> Result<()> {
        match self {
            AnyCache::Redis(c) => c.store_refresh_rotation(old_session_id, new_session_id).await,
            AnyCache::NoOp(c) => c.store_refresh_rotation(old_session_id, new_session_id).await,
        }
    }
    async fn consume_refresh_rotation(&self, old_session_id: &str) -> Result<Option<String>> {
        match self {
            AnyCache::Redis(c) => c.consume_refresh_rotation(old_session_id).await,
            AnyCache::NoOp(c) => c.consume_refresh_rotation(old_session_id).await,
        }
    }
}
