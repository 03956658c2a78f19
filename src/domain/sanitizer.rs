//! HTML escaping for values embedded into the outbound message.

use crate::domain::entities::submission::{ContactForm, SanitizedSubmission};

/// Entities this module emits. An `&` that already starts one of them is kept
/// as-is, which makes [`escape_html`] idempotent.
const KNOWN_ENTITIES: [&str; 5] = ["&amp;", "&lt;", "&gt;", "&quot;", "&#39;"];

/// Trims the value and escapes `&`, `<`, `>`, `"` and `'`.
pub fn escape_html(input: &str) -> String {
    let input = input.trim();
    let mut out = String::with_capacity(input.len() + input.len() / 8);

    for (idx, c) in input.char_indices() {
        match c {
            '&' if KNOWN_ENTITIES.iter().any(|e| input[idx..].starts_with(e)) => out.push('&'),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn sanitize(form: &ContactForm) -> SanitizedSubmission {
    SanitizedSubmission {
        name: escape_html(&form.name),
        email: escape_html(&form.email),
        subject: escape_html(&form.subject),
        message: escape_html(&form.message),
    }
}
