//! Audit event domain model: append-only record of security-relevant actions.

use super::common::StringUuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// The actor that performed an audited action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Actor {
    User { id: Uuid },
    ServiceAccount { id: Uuid },
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Populated by the repository when the event is persisted; absent on
    /// freshly built, not-yet-stored events.
    #[serde(default)]
    pub id: Option<StringUuid>,
    /// `None` for events outside any tenant context (e.g. platform admin actions).
    #[serde(default)]
    pub tenant_id: Option<StringUuid>,
    pub timestamp: DateTime<Utc>,
    pub actor: Actor,
    pub action: String,
    pub target_type: String,
    pub target_id: Option<String>,
    pub details: Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub severity: Severity,
    /// Ties the event back to the request that produced the
    /// `{error, message, code, requestId}` response body, when applicable.
    pub request_id: Option<String>,
}

impl AuditEvent {
    pub fn new(actor: Actor, action: impl Into<String>, target_type: impl Into<String>) -> Self {
        Self {
            id: None,
            tenant_id: None,
            timestamp: Utc::now(),
            actor,
            action: action.into(),
            target_type: target_type.into(),
            target_id: None,
            details: Value::Object(Default::default()),
            ip_address: None,
            user_agent: None,
            severity: Severity::Info,
            request_id: None,
        }
    }

    pub fn with_tenant(mut self, tenant_id: Uuid) -> Self {
        self.tenant_id = Some(StringUuid::from(tenant_id));
        self
    }

    pub fn with_target(mut self, target_id: impl Into<String>) -> Self {
        self.target_id = Some(target_id.into());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}
