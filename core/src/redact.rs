//! Recursive redaction of structured values before they reach a log record.
//!
//! The walk is a typed visitor over [`serde_json::Value`]: objects recurse
//! per key, arrays element-wise in order, scalars are rewritten or passed
//! through. Two rules apply to scalars:
//!
//! - a value held under a key whose name contains a sensitive fragment
//!   (`password`, `token`, `secret`, …) becomes [`MASK`];
//! - a string that carries an inline `Bearer`/`Basic` credential becomes
//!   [`CREDENTIAL_MASK`].
//!
//! Everything else — numbers, booleans, date strings, nulls — passes
//! through unchanged.

use serde_json::Value;

/// Placeholder written over values held under a sensitive key.
pub const MASK: &str = "[REDACTED]";

/// Placeholder written over inline bearer/basic credentials.
pub const CREDENTIAL_MASK: &str = "[REDACTED_CREDENTIAL]";

/// Lowercase key fragments that mark a value as sensitive.
const SENSITIVE_KEY_FRAGMENTS: &[&str] = &[
    "password",
    "passwd",
    "pwd",
    "secret",
    "token",
    "authorization",
    "cookie",
    "apikey",
    "api_key",
    "api-key",
    "api key",
    "credential",
    "private_key",
];

/// Walk `value` and return a copy safe for persistence.
#[must_use]
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), redact_entry(key, value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        Value::String(s) if looks_like_credential(s) => {
            Value::String(CREDENTIAL_MASK.to_string())
        }
        other => other.clone(),
    }
}

/// Structured values recurse before the key rule applies; scalars are
/// judged by their key first, then by their content.
fn redact_entry(key: &str, value: &Value) -> Value {
    match value {
        Value::Object(_) | Value::Array(_) => redact(value),
        _ if is_sensitive_key(key) => Value::String(MASK.to_string()),
        Value::String(s) if looks_like_credential(s) => {
            Value::String(CREDENTIAL_MASK.to_string())
        }
        other => other.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEY_FRAGMENTS
        .iter()
        .any(|fragment| key.contains(fragment))
}

fn looks_like_credential(s: &str) -> bool {
    let s = s.trim_start();
    starts_with_ignore_case(s, "bearer ") || starts_with_ignore_case(s, "basic ")
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}
