use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use zeroize::Zeroizing;

use crate::{entities::submission::OutboundEmail, errors::MailerError, settings::AppConfig};
use super::forwarder::Forwarder;

/// Longest provider error body kept for the server log.
const MAX_ERROR_BODY: usize = 512;

/// Client for the Resend HTTP email API.
pub struct ResendMailer {
    client: Client,
    endpoint: String,
    api_key: Zeroizing<String>,
    timeout_secs: u64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ResendPayload<'a> {
    pub from: &'a str,
    pub to: [&'a str; 1],
    pub reply_to: &'a str,
    pub subject: &'a str,
    pub html: &'a str,
    pub text: &'a str,
}

impl<'a> From<&'a OutboundEmail> for ResendPayload<'a> {
    fn from(email: &'a OutboundEmail) -> Self {
        ResendPayload {
            from: &email.from,
            to: [email.to.as_str()],
            reply_to: &email.reply_to,
            subject: &email.subject,
            html: &email.html,
            text: &email.text,
        }
    }
}

impl ResendMailer {
    pub fn new(config: &AppConfig) -> Result<Self, MailerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.provider_timeout_secs))
            .build()
            .map_err(|e| MailerError::Build(e.to_string()))?;

        Ok(ResendMailer {
            client,
            endpoint: format!("{}/emails", config.resend_api_url.trim_end_matches('/')),
            api_key: Zeroizing::new(config.resend_api_key.clone()),
            timeout_secs: config.provider_timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Forwarder for ResendMailer {
    async fn forward(&self, email: &OutboundEmail) -> Result<(), MailerError> {
        let response = self.client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.as_str())
            .json(&ResendPayload::from(email))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MailerError::Timeout(self.timeout_secs)
                } else {
                    MailerError::from(e)
                }
            })?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(status = status.as_u16(), "Resend accepted message");
            return Ok(());
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }

        Err(MailerError::Rejected {
            status: status.as_u16(),
            body,
        })
    }

    fn provider_name(&self) -> &'static str {
        "resend"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_matches_resend_shape() {
        let email = OutboundEmail {
            from: "Site <noreply@example.com>".into(),
            to: "office@example.com".into(),
            reply_to: "ada@example.com".into(),
            subject: "Website contact: Hi".into(),
            html: "<p>Hi</p>".into(),
            text: "Hi".into(),
        };

        let json = serde_json::to_value(ResendPayload::from(&email)).unwrap();

        assert_eq!(json["to"], serde_json::json!(["office@example.com"]));
        assert_eq!(json["reply_to"], "ada@example.com");
        assert_eq!(json["from"], "Site <noreply@example.com>");
        assert_eq!(json["html"], "<p>Hi</p>");
    }
}
