//! SMTP email transport (lettre).

use super::EmailSender;
use crate::config::SmtpConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpEmailSender {
    pub fn from_config(config: &SmtpConfig) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid smtp host: {e}")))?
            .port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, to: &str, subject: &str, html_body: &str, text_body: &str) -> Result<()> {
        let from: Mailbox = self
            .from_address
            .parse()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid from address: {e}")))?;
        let to: Mailbox = to
            .parse()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid recipient address: {e}")))?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(SinglePart::builder().header(ContentType::TEXT_PLAIN).body(text_body.to_string()))
                    .singlepart(SinglePart::builder().header(ContentType::TEXT_HTML).body(html_body.to_string())),
            )
            .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to build email: {e}")))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("smtp send failed: {e}")))?;
        Ok(())
    }
}
