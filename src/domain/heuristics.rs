//! Cheap, stateless bot checks. A positive result is answered with a fake
//! success, so none of these ever surface as an error to the caller.

use crate::domain::entities::submission::{BotSignal, RawSubmission};

/// A missing or whitespace-only user agent.
pub fn check_user_agent(user_agent: Option<&str>) -> Option<BotSignal> {
    match user_agent {
        Some(ua) if !ua.trim().is_empty() => None,
        _ => Some(BotSignal::MissingUserAgent),
    }
}

pub fn check_honeypot(raw: &RawSubmission) -> Option<BotSignal> {
    match raw.website.as_deref() {
        Some(value) if !value.is_empty() => Some(BotSignal::HoneypotFilled),
        _ => None,
    }
}

/// Compares the render timestamp to `now_ms`. A missing or unparsable
/// timestamp is inconclusive and passes.
pub fn check_fill_time(raw: &RawSubmission, now_ms: i64, min_fill_ms: u64) -> Option<BotSignal> {
    let rendered_at = raw.timestamp.as_deref()?.trim().parse::<i64>().ok()?;
    let elapsed = now_ms.saturating_sub(rendered_at);

    if elapsed < min_fill_ms as i64 {
        Some(BotSignal::SubmittedTooFast)
    } else {
        None
    }
}
