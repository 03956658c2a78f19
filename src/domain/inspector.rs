//! Structural content checks for free-text fields.
//!
//! Only markup, script, injection and encoding tricks are rejected. There is
//! deliberately no topic denylist: financial or legal wording is legitimate
//! correspondence.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::entities::submission::ContactForm;

/// A field holding this many links or more is treated as link spam.
pub const MAX_URLS_PER_FIELD: usize = 3;

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)https?://").expect("valid url regex")
});

static SUSPICIOUS_PATTERNS: Lazy<Vec<(ContentViolation, Regex)>> = Lazy::new(|| {
    [
        (ContentViolation::ScriptTag, r"(?i)<\s*/?\s*(?:script|iframe)\b"),
        (ContentViolation::JavascriptScheme, r"(?i)javascript\s*:"),
        (ContentViolation::EventHandler, r"(?i)\bon[a-z]+\s*="),
        (
            ContentViolation::SqlStatement,
            concat!(
                r"(?i)\b(?:",
                r"union\s+(?:all\s+)?select\b",
                r"|insert\s+into\s+[\w.]+\s*(?:\(|values\b|select\b)",
                r"|update\s+[\w.]+\s+set\s+[\w.]+\s*=",
                r"|delete\s+from\s+[\w.]+\s*(?:where\b|;|--|$)",
                r"|drop\s+(?:table|database)\b",
                r"|select\s+(?:\*|[\w.]+(?:\s*,\s*[\w.]+)+)\s+from\b",
                r"|select\s+[\w.]+\s+from\s+[\w.]+\s*(?:where\b|;|--|$)",
                r")",
            ),
        ),
        (ContentViolation::ControlCharacter, r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]"),
        (ContentViolation::NumericCharReference, r"(?i)&#(?:[0-9]+|x[0-9a-f]+);?"),
        (ContentViolation::EscapedHex, r"(?i)\\x[0-9a-f]{2}"),
    ]
    .into_iter()
    .map(|(violation, pattern)| (violation, Regex::new(pattern).expect("valid content regex")))
    .collect()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentViolation {
    TooManyUrls,
    ScriptTag,
    JavascriptScheme,
    EventHandler,
    SqlStatement,
    ControlCharacter,
    NumericCharReference,
    EscapedHex,
}

/// First violation found in a single value, if any.
pub fn inspect_text(value: &str) -> Option<ContentViolation> {
    if URL_PATTERN.find_iter(value).count() >= MAX_URLS_PER_FIELD {
        return Some(ContentViolation::TooManyUrls);
    }

    SUSPICIOUS_PATTERNS
        .iter()
        .find(|(_, pattern)| pattern.is_match(value))
        .map(|(violation, _)| *violation)
}

/// Checks `name`, `subject` and `message` in order and stops at the first hit.
pub fn inspect_form(form: &ContactForm) -> Option<(&'static str, ContentViolation)> {
    form.free_text_fields()
        .into_iter()
        .find_map(|(field, value)| inspect_text(value).map(|v| (field, v)))
}
