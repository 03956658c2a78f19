use std::borrow::Cow;

use serde::Serialize;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::constants::{HONEYPOT_FIELD, MSG_DELIVERED, TIMESTAMP_FIELD};
use crate::errors::AppError;

/// Form fields exactly as they arrived. Nothing here is trusted.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RawSubmission {
    pub name: Option<String>,
    pub email: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
    pub website: Option<String>,
    pub timestamp: Option<String>,
}

impl RawSubmission {
    /// Builds a submission from decoded `(name, value)` form pairs.
    /// Unknown fields are ignored; a repeated field keeps its first value.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut raw = RawSubmission::default();
        for (key, value) in pairs {
            raw.set_field(key.as_ref(), value.into());
        }
        raw
    }

    pub fn set_field(&mut self, key: &str, value: String) {
        let slot = match key {
            "name" => &mut self.name,
            "email" => &mut self.email,
            "subject" => &mut self.subject,
            "message" => &mut self.message,
            HONEYPOT_FIELD => &mut self.website,
            TIMESTAMP_FIELD => &mut self.timestamp,
            _ => return,
        };
        if slot.is_none() {
            *slot = Some(value);
        }
    }

    /// Requires all four visible fields to be present and non-blank.
    pub fn require_fields(&self) -> Result<ContactForm, AppError> {
        fn required(value: &Option<String>) -> Option<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        }

        match (
            required(&self.name),
            required(&self.email),
            required(&self.subject),
            required(&self.message),
        ) {
            (Some(name), Some(email), Some(subject), Some(message)) => Ok(ContactForm {
                name,
                email,
                subject,
                message,
            }),
            _ => Err(AppError::MissingFields),
        }
    }
}

/// Trimmed, present fields awaiting validation and inspection.
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct ContactForm {
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: String,

    #[validate(
        email(message = "Invalid email address"),
        custom(function = "validate_reply_address")
    )]
    pub email: String,

    #[validate(length(max = 200, message = "Subject must be at most 200 characters"))]
    pub subject: String,

    #[validate(length(max = 5000, message = "Message must be at most 5000 characters"))]
    pub message: String,
}

impl ContactForm {
    /// The free-text fields the content inspector looks at, by field name.
    pub fn free_text_fields(&self) -> [(&'static str, &str); 3] {
        [
            ("name", self.name.as_str()),
            ("subject", self.subject.as_str()),
            ("message", self.message.as_str()),
        ]
    }
}

/// Characters the sanitizer would rewrite. An address holding any of them
/// would no longer reach the sender once escaped, so it is refused up front.
const ESCAPED_CHARS: [char; 5] = ['&', '<', '>', '"', '\''];

fn validate_reply_address(email: &str) -> Result<(), ValidationError> {
    if email.contains(ESCAPED_CHARS) {
        let mut err = ValidationError::new("email_markup_chars");
        err.message = Some(Cow::Borrowed("Email address contains unsupported characters"));
        return Err(err);
    }
    Ok(())
}

/// HTML-escaped fields, safe to embed in an outbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizedSubmission {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

/// What the Forwarder receives. Built from sanitized fields only.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEmail {
    pub from: String,
    pub to: String,
    pub reply_to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

impl OutboundEmail {
    pub fn compose(
        from: &str,
        to: &str,
        subject_prefix: &str,
        submission: &SanitizedSubmission,
        identifier: &str,
        submission_id: Uuid,
    ) -> Self {
        let html = format!(
            "<h2>New contact message</h2>\
             <p><strong>Name:</strong> {name}</p>\
             <p><strong>Email:</strong> {email}</p>\
             <p><strong>Subject:</strong> {subject}</p>\
             <p><strong>Message:</strong></p>\
             <p>{message}</p>\
             <hr>\
             <p><small>Sender IP: {identifier} | Submission: {submission_id}</small></p>",
            name = submission.name,
            email = submission.email,
            subject = submission.subject,
            message = submission.message.replace('\n', "<br>"),
        );

        let text = format!(
            "New contact message\n\n\
             Name: {name}\n\
             Email: {email}\n\
             Subject: {subject}\n\n\
             Message:\n{message}\n\n\
             --\nSender IP: {identifier} | Submission: {submission_id}\n",
            name = submission.name,
            email = submission.email,
            subject = submission.subject,
            message = submission.message,
        );

        OutboundEmail {
            from: from.to_string(),
            to: to.to_string(),
            reply_to: submission.email.clone(),
            subject: format!("{}{}", subject_prefix, submission.subject),
            html,
            text,
        }
    }
}

/// Why a submission was judged automated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotSignal {
    MissingUserAgent,
    HoneypotFilled,
    SubmittedTooFast,
}

impl BotSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            BotSignal::MissingUserAgent => "missing_user_agent",
            BotSignal::HoneypotFilled => "honeypot_filled",
            BotSignal::SubmittedTooFast => "submitted_too_fast",
        }
    }
}

/// Outcome of running a submission through the pipeline.
#[derive(Debug)]
pub enum Verdict {
    Accepted(SanitizedSubmission),
    RejectedSilently(BotSignal),
    RejectedWithError(AppError),
}

/// Success body. Bots get the same one.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ContactResponse {
    pub success: bool,
    pub message: String,
}

impl ContactResponse {
    pub fn delivered() -> Self {
        ContactResponse {
            success: true,
            message: MSG_DELIVERED.to_string(),
        }
    }
}
