//! Webhook repository: endpoint registrations and their delivery queue.

use crate::domain::common::StringUuid;
use crate::domain::webhook::{CreateWebhookInput, DeliveryStatus, UpdateWebhookInput, Webhook, WebhookDelivery};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::MySqlPool;
use uuid::Uuid;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WebhookRepository: Send + Sync {
    async fn create(&self, tenant_id: Uuid, input: &CreateWebhookInput) -> Result<Webhook>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Webhook>>;
    async fn list_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<Webhook>>;
    /// Enabled webhooks subscribed to `event_type` within a tenant.
    async fn list_subscribed(&self, tenant_id: Uuid, event_type: &str) -> Result<Vec<Webhook>>;
    async fn update(&self, id: Uuid, input: &UpdateWebhookInput) -> Result<Webhook>;
    async fn delete(&self, id: Uuid) -> Result<()>;
    async fn record_trigger(&self, id: Uuid, success: bool) -> Result<()>;

    async fn enqueue_delivery(
        &self,
        webhook_id: Uuid,
        url: &str,
        event_type: &str,
        payload: Value,
        max_attempts: i32,
    ) -> Result<WebhookDelivery>;
    async fn find_delivery(&self, id: Uuid) -> Result<Option<WebhookDelivery>>;
    /// Deliveries due for an attempt right now, oldest first.
    async fn list_due_for_retry(&self, limit: i64) -> Result<Vec<WebhookDelivery>>;
    async fn mark_delivering(&self, id: Uuid) -> Result<()>;
    async fn mark_delivered(&self, id: Uuid, status_code: i32) -> Result<()>;
    async fn mark_retry_or_failed(
        &self,
        id: Uuid,
        attempt_count: i32,
        status: DeliveryStatus,
        status_code: Option<i32>,
        error: Option<&str>,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<()>;
}

pub struct WebhookRepositoryImpl {
    pool: MySqlPool,
}

impl WebhookRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    const WEBHOOK_COLUMNS: &'static str =
        "id, tenant_id, name, url, secret, events, enabled, last_triggered_at, failure_count, created_at, updated_at";
    const DELIVERY_COLUMNS: &'static str = "id, webhook_id, url, event_type, payload, attempt_count, max_attempts, next_attempt_at, status, last_status_code, last_error, created_at";
}

#[async_trait]
impl WebhookRepository for WebhookRepositoryImpl {
    async fn create(&self, tenant_id: Uuid, input: &CreateWebhookInput) -> Result<Webhook> {
        let id = StringUuid::new_v4();
        let events_json = serde_json::to_string(&input.events).map_err(|e| AppError::Internal(e.into()))?;

        sqlx::query(
            r#"
            INSERT INTO webhooks (id, tenant_id, name, url, secret, events, enabled, last_triggered_at, failure_count, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, NULL, 0, NOW(), NOW())
            "#,
        )
        .bind(id)
        .bind(StringUuid::from(tenant_id))
        .bind(&input.name)
        .bind(&input.url)
        .bind(&input.secret)
        .bind(&events_json)
        .bind(input.enabled)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id.into())
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("failed to create webhook")))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Webhook>> {
        let query = format!("SELECT {} FROM webhooks WHERE id = ?", Self::WEBHOOK_COLUMNS);
        Ok(sqlx::query_as::<_, Webhook>(&query)
            .bind(StringUuid::from(id))
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<Webhook>> {
        let query = format!(
            "SELECT {} FROM webhooks WHERE tenant_id = ? ORDER BY created_at DESC",
            Self::WEBHOOK_COLUMNS
        );
        Ok(sqlx::query_as::<_, Webhook>(&query)
            .bind(StringUuid::from(tenant_id))
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_subscribed(&self, tenant_id: Uuid, event_type: &str) -> Result<Vec<Webhook>> {
        let query = format!(
            "SELECT {} FROM webhooks WHERE tenant_id = ? AND enabled = true AND JSON_CONTAINS(events, JSON_QUOTE(?))",
            Self::WEBHOOK_COLUMNS
        );
        Ok(sqlx::query_as::<_, Webhook>(&query)
            .bind(StringUuid::from(tenant_id))
            .bind(event_type)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn update(&self, id: Uuid, input: &UpdateWebhookInput) -> Result<Webhook> {
        let existing = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("webhook {id} not found")))?;

        let name = input.name.clone().unwrap_or(existing.name);
        let url = input.url.clone().unwrap_or(existing.url);
        let secret = input.secret.clone().or(existing.secret);
        let events = input.events.clone().unwrap_or_else(|| existing.events.0.clone());
        let enabled = input.enabled.unwrap_or(existing.enabled);
        let events_json = serde_json::to_string(&events).map_err(|e| AppError::Internal(e.into()))?;

        sqlx::query(
            "UPDATE webhooks SET name = ?, url = ?, secret = ?, events = ?, enabled = ?, updated_at = NOW() WHERE id = ?",
        )
        .bind(&name)
        .bind(&url)
        .bind(&secret)
        .bind(&events_json)
        .bind(enabled)
        .bind(StringUuid::from(id))
        .execute(&self.pool)
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("failed to update webhook")))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM webhooks WHERE id = ?")
            .bind(StringUuid::from(id))
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("webhook {id} not found")));
        }
        Ok(())
    }

    async fn record_trigger(&self, id: Uuid, success: bool) -> Result<()> {
        if success {
            sqlx::query(
                "UPDATE webhooks SET last_triggered_at = NOW(), failure_count = 0 WHERE id = ?",
            )
            .bind(StringUuid::from(id))
            .execute(&self.pool)
            .await?;
        } else {
            sqlx::query(
                "UPDATE webhooks SET last_triggered_at = NOW(), failure_count = failure_count + 1 WHERE id = ?",
            )
            .bind(StringUuid::from(id))
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn enqueue_delivery(
        &self,
        webhook_id: Uuid,
        url: &str,
        event_type: &str,
        payload: Value,
        max_attempts: i32,
    ) -> Result<WebhookDelivery> {
        let id = StringUuid::new_v4();
        let payload_json = serde_json::to_string(&payload).map_err(|e| AppError::Internal(e.into()))?;
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO webhook_deliveries (id, webhook_id, url, event_type, payload, attempt_count, max_attempts, next_attempt_at, status, last_status_code, last_error, created_at)
            VALUES (?, ?, ?, ?, ?, 0, ?, ?, 'pending', NULL, NULL, ?)
            "#,
        )
        .bind(id)
        .bind(StringUuid::from(webhook_id))
        .bind(url)
        .bind(event_type)
        .bind(&payload_json)
        .bind(max_attempts)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_delivery(id.into())
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("failed to enqueue webhook delivery")))
    }

    async fn find_delivery(&self, id: Uuid) -> Result<Option<WebhookDelivery>> {
        let query = format!("SELECT {} FROM webhook_deliveries WHERE id = ?", Self::DELIVERY_COLUMNS);
        Ok(sqlx::query_as::<_, WebhookDelivery>(&query)
            .bind(StringUuid::from(id))
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_due_for_retry(&self, limit: i64) -> Result<Vec<WebhookDelivery>> {
        let query = format!(
            "SELECT {} FROM webhook_deliveries WHERE status = 'pending' AND next_attempt_at <= NOW() ORDER BY next_attempt_at ASC LIMIT ?",
            Self::DELIVERY_COLUMNS
        );
        Ok(sqlx::query_as::<_, WebhookDelivery>(&query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn mark_delivering(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE webhook_deliveries SET status = 'delivering' WHERE id = ?")
            .bind(StringUuid::from(id))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_delivered(&self, id: Uuid, status_code: i32) -> Result<()> {
        sqlx::query(
            "UPDATE webhook_deliveries SET status = 'delivered', last_status_code = ?, last_error = NULL WHERE id = ?",
        )
        .bind(status_code)
        .bind(StringUuid::from(id))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_retry_or_failed(
        &self,
        id: Uuid,
        attempt_count: i32,
        status: DeliveryStatus,
        status_code: Option<i32>,
        error: Option<&str>,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE webhook_deliveries SET attempt_count = ?, status = ?, last_status_code = ?, last_error = ?, next_attempt_at = ? WHERE id = ?",
        )
        .bind(attempt_count)
        .bind(status)
        .bind(status_code)
        .bind(error)
        .bind(next_attempt_at)
        .bind(StringUuid::from(id))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
