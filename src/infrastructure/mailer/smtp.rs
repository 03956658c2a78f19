use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::{entities::submission::OutboundEmail, errors::MailerError, settings::AppConfig};
use super::forwarder::Forwarder;

/// Port on which the relay expects TLS from the first byte instead of STARTTLS.
const IMPLICIT_TLS_PORT: u16 = 465;

/// SMTP relay client. The connection pool lives inside the transport.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &AppConfig) -> Result<Self, MailerError> {
        let relay = if config.smtp_port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
        };
        let builder = relay.map_err(|e| MailerError::Build(e.to_string()))?;

        // Handed straight to the transport; no other copy of the password is kept.
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.clone(),
        );
        let transport = builder
            .port(config.smtp_port)
            .credentials(credentials)
            .timeout(Some(Duration::from_secs(config.provider_timeout_secs)))
            .build();

        Ok(SmtpMailer { transport })
    }
}

fn parse_mailbox(value: &str) -> Result<Mailbox, MailerError> {
    value
        .parse::<Mailbox>()
        .map_err(|e| MailerError::Address(e.to_string()))
}

/// Builds a multipart/alternative message with plain text and HTML parts.
pub fn build_message(email: &OutboundEmail) -> Result<Message, MailerError> {
    Message::builder()
        .from(parse_mailbox(&email.from)?)
        .reply_to(parse_mailbox(&email.reply_to)?)
        .to(parse_mailbox(&email.to)?)
        .subject(email.subject.as_str())
        .multipart(MultiPart::alternative_plain_html(
            email.text.clone(),
            email.html.clone(),
        ))
        .map_err(|e| MailerError::Build(e.to_string()))
}

#[async_trait]
impl Forwarder for SmtpMailer {
    async fn forward(&self, email: &OutboundEmail) -> Result<(), MailerError> {
        let message = build_message(email)?;

        let response = self.transport
            .send(message)
            .await
            .map_err(|e| MailerError::Transport(e.to_string()))?;

        tracing::debug!(code = %response.code(), "SMTP relay accepted message");
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "smtp"
    }
}
