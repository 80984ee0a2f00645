//! Outbound transactional email: magic-link sign-in and tenant-invitation
//! delivery. Services depend on the `EmailSender` trait, never a concrete
//! transport.

pub mod smtp;

pub use smtp::SmtpEmailSender;

use crate::error::Result;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str, text_body: &str) -> Result<()>;
}

/// No-op sender for tests and local development without an SMTP relay.
#[derive(Default)]
pub struct NoopEmailSender;

#[async_trait]
impl EmailSender for NoopEmailSender {
    async fn send(&self, to: &str, subject: &str, _html_body: &str, _text_body: &str) -> Result<()> {
        tracing::debug!(to, subject, "noop email sender: discarding message");
        Ok(())
    }
}
