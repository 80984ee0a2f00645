//! Webhook delivery service (spec.md §4.7): endpoint CRUD, queuing
//! deliveries for subscribed events, and a bounded worker pool that drains
//! the retry queue with exponential backoff.

use crate::config::EncryptionConfig;
use crate::crypto::{self, EncryptionKey};
use crate::domain::common::StringUuid;
use crate::domain::webhook::{
    CreateWebhookInput, DeliveryStatus, UpdateWebhookInput, Webhook, WebhookDelivery, DEFAULT_MAX_ATTEMPTS,
};
use crate::error::{AppError, Result};
use crate::repository::WebhookRepository;
use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::Rng;
use serde_json::Value;
use sha2::Sha256;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::time::{timeout, Duration};
use validator::Validate;

type HmacSha256 = Hmac<Sha256>;

/// How many deliveries `process_due_deliveries` drives concurrently.
const WORKER_CONCURRENCY: usize = 8;
const DELIVERY_TIMEOUT_SECS: u64 = 30;

fn generate_webhook_secret() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    format!("whsec_{}", hex::encode(bytes))
}

/// Signs `"{timestamp}.{payload}"`, matching the construction consumers
/// are expected to replay to prevent payload/timestamp mismatch replay.
fn sign(secret: &str, timestamp: i64, payload: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid HMAC key: {e}")))?;
    mac.update(format!("{timestamp}.{payload}").as_bytes());
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

pub struct WebhookService<W: WebhookRepository> {
    repo: Arc<W>,
    http_client: reqwest::Client,
    encryption_key: EncryptionKey,
}

impl<W: WebhookRepository + 'static> WebhookService<W> {
    pub fn new(repo: Arc<W>, encryption_config: &EncryptionConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DELIVERY_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            repo,
            http_client,
            encryption_key: EncryptionKey::from_config_material(encryption_config.key_material.as_bytes()),
        }
    }

    pub async fn create(&self, tenant_id: StringUuid, mut input: CreateWebhookInput) -> Result<Webhook> {
        input.validate()?;
        let raw_secret = input.secret.take().unwrap_or_else(generate_webhook_secret);
        input.secret = Some(crypto::encrypt(&self.encryption_key, &raw_secret)?);
        self.repo.create(tenant_id.into(), &input).await
    }

    pub async fn get(&self, id: StringUuid) -> Result<Webhook> {
        self.repo
            .find_by_id(id.into())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("webhook {id} not found")))
    }

    pub async fn list_for_tenant(&self, tenant_id: StringUuid) -> Result<Vec<Webhook>> {
        self.repo.list_for_tenant(tenant_id.into()).await
    }

    pub async fn update(&self, id: StringUuid, mut input: UpdateWebhookInput) -> Result<Webhook> {
        input.validate()?;
        if let Some(raw_secret) = input.secret.take() {
            input.secret = Some(crypto::encrypt(&self.encryption_key, &raw_secret)?);
        }
        self.repo.update(id.into(), &input).await
    }

    pub async fn delete(&self, id: StringUuid) -> Result<()> {
        self.repo.delete(id.into()).await
    }

    pub async fn regenerate_secret(&self, id: StringUuid) -> Result<Webhook> {
        let encrypted = crypto::encrypt(&self.encryption_key, &generate_webhook_secret())?;
        self.repo
            .update(id.into(), &UpdateWebhookInput { secret: Some(encrypted), ..Default::default() })
            .await
    }

    /// Queue a delivery for every enabled webhook subscribed to `event_type`.
    pub async fn trigger(&self, tenant_id: StringUuid, event_type: &str, payload: Value) -> Result<usize> {
        let webhooks = self.repo.list_subscribed(tenant_id.into(), event_type).await?;
        for webhook in &webhooks {
            self.repo
                .enqueue_delivery(webhook.id.into(), &webhook.url, event_type, payload.clone(), DEFAULT_MAX_ATTEMPTS)
                .await?;
        }
        Ok(webhooks.len())
    }

    async fn attempt_delivery(&self, webhook: &Webhook, delivery: &WebhookDelivery) -> std::result::Result<u16, (Option<u16>, String)> {
        let payload = delivery.payload.0.to_string();
        let timestamp = Utc::now().timestamp();

        let mut request = self
            .http_client
            .post(&delivery.url)
            .header("Content-Type", "application/json")
            .header("X-Webhook-Event", &delivery.event_type)
            .header("X-Webhook-Delivery-Id", delivery.id.to_string())
            .header("X-Webhook-Timestamp", timestamp.to_string());

        if let Some(encrypted_secret) = &webhook.secret {
            let secret = crypto::decrypt(&self.encryption_key, encrypted_secret).map_err(|e| (None, e.to_string()))?;
            let signature = sign(&secret, timestamp, &payload).map_err(|e| (None, e.to_string()))?;
            request = request.header("X-Webhook-Signature", signature);
        }

        let response = timeout(Duration::from_secs(DELIVERY_TIMEOUT_SECS), request.body(payload).send())
            .await
            .map_err(|_| (None, "webhook request timed out".to_string()))?
            .map_err(|e| (None, e.to_string()))?;

        let status_code = response.status().as_u16();
        if !response.status().is_success() {
            return Err((Some(status_code), format!("webhook returned status {status_code}")));
        }
        Ok(status_code)
    }

    /// Drain up to `limit` due deliveries, bounded to `WORKER_CONCURRENCY`
    /// concurrent attempts. Returns the number of deliveries attempted.
    pub async fn process_due_deliveries(&self, limit: i64) -> Result<usize> {
        let due = self.repo.list_due_for_retry(limit).await?;
        let semaphore = Arc::new(Semaphore::new(WORKER_CONCURRENCY));
        let mut handles = Vec::with_capacity(due.len());

        for delivery in due {
            let Some(webhook) = self.repo.find_by_id(delivery.webhook_id.into()).await? else {
                continue;
            };
            let permit = semaphore.clone().acquire_owned().await.expect("semaphore never closed");
            let repo = self.repo.clone();
            let client = self.http_client.clone();
            let key = self.encryption_key.clone();

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let service = WebhookService { repo: repo.clone(), http_client: client, encryption_key: key };
                let _ = repo.mark_delivering(delivery.id.into()).await;

                match service.attempt_delivery(&webhook, &delivery).await {
                    Ok(status_code) => {
                        let _ = repo.mark_delivered(delivery.id.into(), status_code as i32).await;
                        let _ = repo.record_trigger(webhook.id.into(), true).await;
                    }
                    Err((status_code, error)) => {
                        let mut retried = delivery.clone();
                        retried.schedule_retry(status_code.map(|c| c as i32), error.clone());
                        let _ = repo
                            .mark_retry_or_failed(
                                delivery.id.into(),
                                retried.attempt_count,
                                retried.status,
                                status_code.map(|c| c as i32),
                                Some(&error),
                                retried.next_attempt_at,
                            )
                            .await;
                        let _ = repo.record_trigger(webhook.id.into(), false).await;
                    }
                }
            }));
        }

        let attempted = handles.len();
        for handle in handles {
            let _ = handle.await;
        }
        Ok(attempted)
    }

    /// Send a one-off test event directly, bypassing the delivery queue.
    pub async fn test(&self, id: StringUuid) -> Result<WebhookTestResult> {
        let webhook = self.get(id).await?;
        let payload = serde_json::json!({ "message": "this is a test webhook event", "webhook_id": id.to_string() });
        let test_delivery = WebhookDelivery {
            id: StringUuid::new_v4(),
            webhook_id: id,
            url: webhook.url.clone(),
            event_type: "test".to_string(),
            payload: sqlx::types::Json(payload),
            attempt_count: 0,
            max_attempts: 1,
            next_attempt_at: Utc::now(),
            status: DeliveryStatus::Pending,
            last_status_code: None,
            last_error: None,
            created_at: Utc::now(),
        };

        let start = Instant::now();
        match self.attempt_delivery(&webhook, &test_delivery).await {
            Ok(status_code) => Ok(WebhookTestResult {
                success: true,
                status_code: Some(status_code),
                error: None,
                response_time_ms: Some(start.elapsed().as_millis() as u64),
            }),
            Err((status_code, error)) => Ok(WebhookTestResult {
                success: false,
                status_code,
                error: Some(error),
                response_time_ms: Some(start.elapsed().as_millis() as u64),
            }),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct WebhookTestResult {
    pub success: bool,
    pub status_code: Option<u16>,
    pub error: Option<String>,
    pub response_time_ms: Option<u64>,
}
