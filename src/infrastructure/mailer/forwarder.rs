use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    entities::submission::OutboundEmail,
    errors::MailerError,
    settings::{AppConfig, MailProvider},
};
use super::{resend::ResendMailer, smtp::SmtpMailer};

/// Hands a validated, sanitized message to an email provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(&self, email: &OutboundEmail) -> Result<(), MailerError>;

    fn provider_name(&self) -> &'static str;
}

#[async_trait]
impl<T: Forwarder + ?Sized> Forwarder for Arc<T> {
    async fn forward(&self, email: &OutboundEmail) -> Result<(), MailerError> {
        (**self).forward(email).await
    }

    fn provider_name(&self) -> &'static str {
        (**self).provider_name()
    }
}

/// The provider selected by configuration.
pub enum EmailProvider {
    Resend(ResendMailer),
    Smtp(SmtpMailer),
}

impl EmailProvider {
    pub fn from_config(config: &AppConfig) -> Result<Self, MailerError> {
        match config.provider {
            MailProvider::Resend => Ok(EmailProvider::Resend(ResendMailer::new(config)?)),
            MailProvider::Smtp => Ok(EmailProvider::Smtp(SmtpMailer::new(config)?)),
        }
    }
}

#[async_trait]
impl Forwarder for EmailProvider {
    async fn forward(&self, email: &OutboundEmail) -> Result<(), MailerError> {
        match self {
            EmailProvider::Resend(mailer) => mailer.forward(email).await,
            EmailProvider::Smtp(mailer) => mailer.forward(email).await,
        }
    }

    fn provider_name(&self) -> &'static str {
        match self {
            EmailProvider::Resend(mailer) => mailer.provider_name(),
            EmailProvider::Smtp(mailer) => mailer.provider_name(),
        }
    }
}
