//! services/api/src/adapters/mailer.rs
//!
//! SMTP delivery via lettre. Implements the `MailService` port.

use async_trait::async_trait;
use lettre::{
    message::header::ContentType,
    transport::smtp::{authentication::Credentials, Error as SmtpError},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use quillwright_core::ports::{MailService, OutgoingEmail, PortError, PortResult};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::MailConfig;

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

impl From<EmailError> for PortError {
    fn from(e: EmailError) -> Self {
        match e {
            EmailError::InvalidAddress(addr) => PortError::InvalidInput(addr),
            other => PortError::Unexpected(other.to_string()),
        }
    }
}

/// Sends plain-text transactional mail over STARTTLS.
#[derive(Clone)]
pub struct SmtpMailer {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    /// Builds the transport. No connection is made until the first send.
    pub fn new(config: &MailConfig) -> Result<Self, EmailError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }

    fn build_message(&self, email: &OutgoingEmail) -> Result<Message, EmailError> {
        let message = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(email
                .to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(email.to.clone()))?)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(email.text_body.clone())?;
        Ok(message)
    }
}

#[async_trait]
impl MailService for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> PortResult<()> {
        let message = self.build_message(&email)?;
        self.mailer.send(message).await.map_err(EmailError::from)?;
        tracing::info!(to = %email.to, subject = %email.subject, "Email sent successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn mailer(from: &str) -> SmtpMailer {
        SmtpMailer::new(&MailConfig {
            smtp_host: "smtp.example.com".to_string(),
            smtp_port: 587,
            smtp_username: "user".to_string(),
            smtp_password: SecretString::from("pass"),
            from_address: from.to_string(),
        })
        .unwrap()
    }

    fn email(to: &str) -> OutgoingEmail {
        OutgoingEmail {
            to: to.to_string(),
            subject: "Hello".to_string(),
            text_body: "Body".to_string(),
        }
    }

    #[tokio::test]
    async fn builds_plain_text_message() {
        let message = mailer("Quillwright <noreply@example.com>")
            .build_message(&email("ann@example.com"))
            .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Hello"));
        assert!(raw.contains("To: ann@example.com"));
    }

    #[tokio::test]
    async fn rejects_bad_recipient() {
        let err = mailer("noreply@example.com")
            .build_message(&email("not an address"))
            .unwrap_err();
        assert!(matches!(err, EmailError::InvalidAddress(_)));
    }
}
