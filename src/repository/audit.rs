//! Audit event repository: append-only, filterable by actor/target/time.

use crate::domain::audit::{Actor, AuditEvent, Severity};
use crate::domain::common::StringUuid;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::mysql::MySqlRow;
use sqlx::{FromRow, MySqlPool, Row};
use uuid::Uuid;

impl<'r> FromRow<'r, MySqlRow> for AuditEvent {
    fn from_row(row: &'r MySqlRow) -> sqlx::Result<Self> {
        let id: StringUuid = row.try_get("id")?;
        let tenant_id: Option<StringUuid> = row.try_get("tenant_id")?;
        let timestamp: DateTime<Utc> = row.try_get("timestamp")?;
        let actor_kind: String = row.try_get("actor_kind")?;
        let actor_id: Option<StringUuid> = row.try_get("actor_id")?;
        let actor = match actor_kind.as_str() {
            "user" => Actor::User { id: actor_id.map(Into::into).unwrap_or_default() },
            "service_account" => Actor::ServiceAccount { id: actor_id.map(Into::into).unwrap_or_default() },
            _ => Actor::System,
        };
        let action: String = row.try_get("action")?;
        let target_type: String = row.try_get("target_type")?;
        let target_id: Option<String> = row.try_get("target_id")?;
        let details_wrapper: sqlx::types::Json<serde_json::Value> = row.try_get("details")?;
        let ip_address: Option<String> = row.try_get("ip_address")?;
        let user_agent: Option<String> = row.try_get("user_agent")?;
        let severity_str: String = row.try_get("severity")?;
        let severity = match severity_str.as_str() {
            "warning" => Severity::Warning,
            "critical" => Severity::Critical,
            _ => Severity::Info,
        };
        let request_id: Option<String> = row.try_get("request_id")?;

        Ok(AuditEvent {
            id: Some(id),
            tenant_id,
            timestamp,
            actor,
            action,
            target_type,
            target_id,
            details: details_wrapper.0,
            ip_address,
            user_agent,
            severity,
            request_id,
        })
    }
}

/// Audit event query parameters (all optional filters, AND-combined).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditQuery {
    pub tenant_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub action: Option<String>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn create(&self, event: &AuditEvent) -> Result<()>;
    async fn find(&self, query: &AuditQuery) -> Result<Vec<AuditEvent>>;
    async fn count(&self, query: &AuditQuery) -> Result<i64>;
}

pub struct AuditRepositoryImpl {
    pool: MySqlPool,
}

impl AuditRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    const COLUMNS: &'static str = "id, tenant_id, timestamp, actor_kind, actor_id, action, target_type, target_id, details, ip_address, user_agent, severity, request_id";
}

fn severity_str(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "info",
        Severity::Warning => "warning",
        Severity::Critical => "critical",
    }
}

#[async_trait]
impl AuditRepository for AuditRepositoryImpl {
    async fn create(&self, event: &AuditEvent) -> Result<()> {
        let id = StringUuid::new_v4();
        let (actor_kind, actor_id): (&str, Option<StringUuid>) = match &event.actor {
            Actor::User { id } => ("user", Some(StringUuid::from(*id))),
            Actor::ServiceAccount { id } => ("service_account", Some(StringUuid::from(*id))),
            Actor::System => ("system", None),
        };
        let details_json = serde_json::to_string(&event.details)
            .map_err(|e| crate::error::AppError::Internal(e.into()))?;

        sqlx::query(&format!(
            "INSERT INTO audit_events ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            Self::COLUMNS
        ))
        .bind(id)
        .bind(event.tenant_id)
        .bind(event.timestamp)
        .bind(actor_kind)
        .bind(actor_id)
        .bind(&event.action)
        .bind(&event.target_type)
        .bind(&event.target_id)
        .bind(&details_json)
        .bind(&event.ip_address)
        .bind(&event.user_agent)
        .bind(severity_str(event.severity))
        .bind(&event.request_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, query: &AuditQuery) -> Result<Vec<AuditEvent>> {
        let mut sql = format!("SELECT {} FROM audit_events WHERE 1=1", Self::COLUMNS);
        if query.tenant_id.is_some() {
            sql.push_str(" AND tenant_id = ?");
        }
        if query.actor_id.is_some() {
            sql.push_str(" AND actor_id = ?");
        }
        if query.target_type.is_some() {
            sql.push_str(" AND target_type = ?");
        }
        if query.target_id.is_some() {
            sql.push_str(" AND target_id = ?");
        }
        if query.action.is_some() {
            sql.push_str(" AND action = ?");
        }
        if query.from_date.is_some() {
            sql.push_str(" AND timestamp >= ?");
        }
        if query.to_date.is_some() {
            sql.push_str(" AND timestamp <= ?");
        }
        sql.push_str(" ORDER BY timestamp DESC LIMIT ? OFFSET ?");

        let mut builder = sqlx::query_as::<_, AuditEvent>(&sql);
        if let Some(tenant_id) = query.tenant_id {
            builder = builder.bind(StringUuid::from(tenant_id));
        }
        if let Some(actor_id) = query.actor_id {
            builder = builder.bind(StringUuid::from(actor_id));
        }
        if let Some(ref target_type) = query.target_type {
            builder = builder.bind(target_type);
        }
        if let Some(ref target_id) = query.target_id {
            builder = builder.bind(target_id);
        }
        if let Some(ref action) = query.action {
            builder = builder.bind(action);
        }
        if let Some(from_date) = query.from_date {
            builder = builder.bind(from_date);
        }
        if let Some(to_date) = query.to_date {
            builder = builder.bind(to_date);
        }
        let limit = query.limit.unwrap_or(50).min(200);
        let offset = query.offset.unwrap_or(0);
        builder = builder.bind(limit).bind(offset);

        Ok(builder.fetch_all(&self.pool).await?)
    }

    async fn count(&self, query: &AuditQuery) -> Result<i64> {
        let mut sql = String::from("SELECT COUNT(*) FROM audit_events WHERE 1=1");
        if query.tenant_id.is_some() {
            sql.push_str(" AND tenant_id = ?");
        }
        if query.actor_id.is_some() {
            sql.push_str(" AND actor_id = ?");
        }
        if query.target_type.is_some() {
            sql.push_str(" AND target_type = ?");
        }
        if query.target_id.is_some() {
            sql.push_str(" AND target_id = ?");
        }
        if query.action.is_some() {
            sql.push_str(" AND action = ?");
        }
        if query.from_date.is_some() {
            sql.push_str(" AND timestamp >= ?");
        }
        if query.to_date.is_some() {
            sql.push_str(" AND timestamp <= ?");
        }

        let mut builder = sqlx::query_as::<_, (i64,)>(&sql);
        if let Some(tenant_id) = query.tenant_id {
            builder = builder.bind(StringUuid::from(tenant_id));
        }
        if let Some(actor_id) = query.actor_id {
            builder = builder.bind(StringUuid::from(actor_id));
        }
        if let Some(ref target_type) = query.target_type {
            builder = builder.bind(target_type);
        }
        if let Some(ref target_id) = query.target_id {
            builder = builder.bind(target_id);
        }
        if let Some(ref action) = query.action {
            builder = builder.bind(action);
        }
        if let Some(from_date) = query.from_date {
            builder = builder.bind(from_date);
        }
        if let Some(to_date) = query.to_date {
            builder = builder.bind(to_date);
        }

        let (count,) = builder.fetch_one(&self.pool).await?;
        Ok(count)
    }
}
