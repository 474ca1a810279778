//! Header lookup and log redaction.

use std::fmt;

/// Placeholder printed instead of sensitive header values.
pub const REDACTED: &str = "[REDACTED]";

const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
    "x-auth-token",
];

const SENSITIVE_FRAGMENTS: &[&str] = &["token", "secret", "signature", "password", "credential"];

/// Returns whether a header carries credentials and must not be logged.
#[must_use]
pub fn is_sensitive_header(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    SENSITIVE_HEADERS.contains(&lower.as_str())
        || SENSITIVE_FRAGMENTS
            .iter()
            .any(|fragment| lower.contains(fragment))
}

/// Returns the value to log for a header.
#[must_use]
pub fn loggable_value<'a>(name: &str, value: &'a str) -> &'a str {
    if is_sensitive_header(name) {
        REDACTED
    } else {
        value
    }
}

/// First value of a header, matched case-insensitively.
pub(crate) fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// `Display` adapter that renders headers with sensitive values redacted.
pub struct RedactedHeaders<'a>(pub &'a [(String, String)]);

impl fmt::Display for RedactedHeaders<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (index, (name, value)) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {}", loggable_value(name, value))?;
        }
        f.write_str("}")
    }
}
