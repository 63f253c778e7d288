//! Email dispatcher — one plain-text email per relayed conversation.
//!
//! The SMTP implementation uses lettre's blocking transport over implicit
//! TLS. The blocking send runs on tokio's blocking pool and is bounded by
//! the configured deadline.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;

use crate::config::SmtpConfig;
use crate::error::DispatchError;

/// Sends one email to one recipient.
#[async_trait]
pub trait EmailDispatcher: Send + Sync {
    async fn send(&self, to: &str, body: &str) -> Result<(), DispatchError>;
}

/// [`EmailDispatcher`] backed by an SMTPS server.
pub struct SmtpDispatcher {
    config: SmtpConfig,
}

impl SmtpDispatcher {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    /// Build the outgoing message: configured sender and subject,
    /// `text/plain` body.
    pub fn build_message(&self, to: &str, body: &str) -> Result<Message, DispatchError> {
        let recipient: Mailbox = to.parse().map_err(|e| DispatchError::InvalidAddress {
            field: "to",
            address: to.to_string(),
            reason: format!("{e}"),
        })?;

        Message::builder()
            .from(self.config.from.clone())
            .to(recipient)
            .subject(self.config.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| DispatchError::Build(e.to_string()))
    }

    /// A fresh, unpooled transport. The connection closes when it drops.
    fn transport(&self) -> Result<SmtpTransport, DispatchError> {
        let creds = Credentials::new(
            self.config.login.clone(),
            self.config.password.expose_secret().to_string(),
        );

        Ok(SmtpTransport::relay(&self.config.host)
            .map_err(|e| DispatchError::Transport(format!("SMTP relay error: {e}")))?
            .port(self.config.port)
            .credentials(creds)
            .timeout(Some(self.config.timeout))
            .build())
    }
}

#[async_trait]
impl EmailDispatcher for SmtpDispatcher {
    async fn send(&self, to: &str, body: &str) -> Result<(), DispatchError> {
        let email = self.build_message(to, body)?;
        let transport = self.transport()?;
        let deadline = self.config.timeout;

        // On timeout the blocking thread lives on until lettre's own socket
        // timeout (same duration) ends it.
        let task = tokio::task::spawn_blocking(move || transport.send(&email));

        match tokio::time::timeout(deadline, task).await {
            Err(_) => Err(DispatchError::TimedOut(deadline)),
            Ok(Err(e)) => Err(DispatchError::TaskFailed(e.to_string())),
            Ok(Ok(Err(e))) => Err(DispatchError::Transport(e.to_string())),
            Ok(Ok(Ok(_))) => {
                tracing::info!(
                    host = %self.config.host,
                    port = self.config.port,
                    "Email sent to {to}"
                );
                Ok(())
            }
        }
    }
}
