//! Audit trail service: the sink every other service injects to record
//! security-relevant events (spec.md §2, §4.8).

use crate::domain::audit::AuditEvent;
use crate::repository::audit::{AuditQuery, AuditRepository};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Narrow interface the rest of the services depend on. Keeps audit
/// logging decoupled from query/listing concerns the admin API needs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent) -> Result<()>;
}

pub struct AuditService<R: AuditRepository> {
    repo: Arc<R>,
}

impl<R: AuditRepository> AuditService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub async fn find(&self, query: &AuditQuery) -> Result<Vec<AuditEvent>> {
        self.repo.find(query).await
    }

    pub async fn count(&self, query: &AuditQuery) -> Result<i64> {
        self.repo.count(query).await
    }
}

#[async_trait]
impl<R: AuditRepository + 'static> AuditSink for AuditService<R> {
    async fn record(&self, event: AuditEvent) -> Result<()> {
        if let Err(e) = self.repo.create(&event).await {
            tracing::error!(error = %e, action = %event.action, "failed to persist audit event");
            return Err(e);
        }
        Ok(())
    }
}
