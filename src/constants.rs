use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;

pub static START_TIME: Lazy<DateTime<Utc>> = Lazy::new(Utc::now);

/// Identifier used when no header or socket address resolves the caller.
pub const UNKNOWN_IDENTIFIER: &str = "unknown";

/// Honeypot form field. Hidden from humans, so any value means a bot filled it.
pub const HONEYPOT_FIELD: &str = "website";
pub const TIMESTAMP_FIELD: &str = "_timestamp";

pub const MSG_DELIVERED: &str = "Your message has been sent successfully.";
pub const MSG_ALL_FIELDS_REQUIRED: &str = "All fields are required.";
pub const MSG_TOO_MANY_REQUESTS: &str = "Too many requests. Please try again later.";
pub const MSG_CONTENT_NOT_PERMITTED: &str = "The submitted content is not permitted.";
pub const MSG_DELIVERY_FAILED: &str = "Failed to send your message. Please try again later.";
