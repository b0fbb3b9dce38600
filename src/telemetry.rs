//! Log redaction for credential- and PII-bearing fields.
//!
//! Everything the transport puts into a `tracing` event passes through here
//! first. Matching is case-insensitive and ignores `_` / `-`, so `X-Api-Key`,
//! `api_key` and `APIKEY` are all caught.

use reqwest::header::HeaderMap;
use serde_json::Value;

pub const REDACTED: &str = "[REDACTED]";

/// Substrings that mark a key as sensitive once normalized.
const SENSITIVE_FRAGMENTS: &[&str] = &[
    "apikey",
    "authorization",
    "password",
    "secret",
    "token",
    "bearer",
    "cookie",
    // POPIA
    "idnumber",
    "taxref",
    "registrationnumber",
    "accountnumber",
    "cvv",
];

/// Keys too short to match as substrings without false positives.
const SENSITIVE_EXACT: &[&str] = &["pan"];

fn normalize(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Whether a header name, query key or JSON field name must be redacted.
pub fn is_sensitive_key(key: &str) -> bool {
    let key = normalize(key);
    SENSITIVE_FRAGMENTS.iter().any(|f| key.contains(f)) || SENSITIVE_EXACT.contains(&key.as_str())
}

/// Header name/value pairs safe for logging.
pub fn redact_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let shown = if is_sensitive_key(name.as_str()) {
                REDACTED.to_string()
            } else {
                value.to_str().unwrap_or("<binary>").to_string()
            };
            (name.as_str().to_string(), shown)
        })
        .collect()
}

/// Query pairs safe for logging.
pub fn redact_query(query: &[(String, String)]) -> Vec<(String, String)> {
    query
        .iter()
        .map(|(k, v)| {
            let shown = if is_sensitive_key(k) { REDACTED } else { v.as_str() };
            (k.clone(), shown.to_string())
        })
        .collect()
}

/// Deep copy of `value` with every sensitive field replaced.
pub fn redact_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let v = if is_sensitive_key(k) {
                        Value::String(REDACTED.to_string())
                    } else {
                        redact_json(v)
                    };
                    (k.clone(), v)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_json).collect()),
        other => other.clone(),
    }
}
