//! Unified SDK error types.
//!
//! [`ApiError`] is the only error the transport produces. Every non-2xx
//! response and every network-level failure is classified into exactly one
//! [`ErrorKind`] here; wrapper code passes it through unchanged.

use serde_json::Value;
use thiserror::Error;

use crate::http::retry::RETRYABLE_STATUSES;

/// Stable error codes carried by [`ApiError::code`] when the server does not
/// supply its own.
pub mod codes {
    pub const AUTH_INVALID_KEY: &str = "LUNA_ERR_AUTH_INVALID_KEY";
    pub const AUTH_TOKEN_EXPIRED: &str = "LUNA_ERR_AUTH_TOKEN_EXPIRED";
    pub const AUTH_INSUFFICIENT_PERMISSIONS: &str = "LUNA_ERR_AUTH_INSUFFICIENT_PERMISSIONS";
    pub const RATE_LIMIT_EXCEEDED: &str = "LUNA_ERR_RATE_LIMIT_EXCEEDED";
    pub const RESOURCE_NOT_FOUND: &str = "LUNA_ERR_RESOURCE_NOT_FOUND";
    pub const RESOURCE_CONFLICT: &str = "LUNA_ERR_RESOURCE_CONFLICT";
    pub const VALIDATION_FAILED: &str = "LUNA_ERR_VALIDATION_FAILED";
    pub const NETWORK_TIMEOUT: &str = "LUNA_ERR_NETWORK_TIMEOUT";
    pub const NETWORK_CONNECTION: &str = "LUNA_ERR_NETWORK_CONNECTION";
    pub const SERVER_INTERNAL: &str = "LUNA_ERR_SERVER_INTERNAL";
    pub const SERVER_UNAVAILABLE: &str = "LUNA_ERR_SERVER_UNAVAILABLE";
    pub const UNKNOWN: &str = "LUNA_ERR_UNKNOWN";
}

const DOCS_BASE_URL: &str = "https://docs.eclipse.dev/luna/errors";

/// The fixed taxonomy of API failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Authentication,
    Authorization,
    Validation,
    NotFound,
    Conflict,
    RateLimit,
    Network,
    Server,
    Unknown,
}

impl ErrorKind {
    /// Map an HTTP status to its error kind.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::Validation,
            401 => Self::Authentication,
            403 => Self::Authorization,
            404 => Self::NotFound,
            409 => Self::Conflict,
            429 => Self::RateLimit,
            500..=599 => Self::Server,
            _ => Self::Unknown,
        }
    }

    /// Kinds that may succeed if the same request is sent again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimit | Self::Network | Self::Server)
    }

    fn default_code(&self, status: u16) -> &'static str {
        match self {
            Self::Authentication => codes::AUTH_INVALID_KEY,
            Self::Authorization => codes::AUTH_INSUFFICIENT_PERMISSIONS,
            Self::Validation => codes::VALIDATION_FAILED,
            Self::NotFound => codes::RESOURCE_NOT_FOUND,
            Self::Conflict => codes::RESOURCE_CONFLICT,
            Self::RateLimit => codes::RATE_LIMIT_EXCEEDED,
            Self::Network => codes::NETWORK_CONNECTION,
            Self::Server if status == 503 => codes::SERVER_UNAVAILABLE,
            Self::Server => codes::SERVER_INTERNAL,
            Self::Unknown => codes::UNKNOWN,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::RateLimit => "rate_limit",
            Self::Network => "network",
            Self::Server => "server",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A classified API failure.
///
/// Network-level failures carry status `0` since no response was received.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("[{code}] {message}{}", request_suffix(.request_id))]
pub struct ApiError {
    pub kind: ErrorKind,
    pub code: String,
    pub message: String,
    pub status: u16,
    pub request_id: Option<String>,
    pub details: Option<Value>,
    /// Server-requested wait. Only ever set for [`ErrorKind::RateLimit`].
    pub retry_after_secs: Option<u64>,
    retry_disabled: bool,
}

fn request_suffix(request_id: &Option<String>) -> String {
    match request_id {
        Some(id) => format!(" (Request ID: {})", id),
        None => String::new(),
    }
}

impl ApiError {
    pub fn new(kind: ErrorKind, code: impl Into<String>, message: impl Into<String>, status: u16) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            status,
            request_id: None,
            details: None,
            retry_after_secs: None,
            retry_disabled: false,
        }
    }

    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Exclude this error from retries regardless of its kind or status.
    pub fn non_retryable(mut self) -> Self {
        self.retry_disabled = true;
        self
    }

    pub fn is_marked_non_retryable(&self) -> bool {
        self.retry_disabled
    }

    /// Authentication failure raised locally (bad key, failed refresh, ...).
    pub fn authentication(code: &str, message: impl Into<String>, status: u16) -> Self {
        Self::new(ErrorKind::Authentication, code, message, status).non_retryable()
    }

    /// The attempt exceeded its deadline.
    pub fn timeout(request_id: Option<String>) -> Self {
        Self::new(ErrorKind::Network, codes::NETWORK_TIMEOUT, "Request timeout", 0)
            .with_request_id(request_id)
    }

    /// The connection could not be established or was dropped mid-exchange.
    pub fn connection(request_id: Option<String>) -> Self {
        Self::new(ErrorKind::Network, codes::NETWORK_CONNECTION, "Connection error", 0)
            .with_request_id(request_id)
    }

    pub(crate) fn from_reqwest(err: &reqwest::Error, request_id: Option<String>) -> Self {
        if err.is_timeout() {
            Self::timeout(request_id)
        } else {
            Self::connection(request_id)
        }
    }

    /// Classify a non-2xx response.
    ///
    /// Accepts both `{"error": {...}}` and flat `{"code", "message", ...}`
    /// bodies. Anything missing or malformed falls back to defaults derived
    /// from the status; this never fails.
    pub fn from_response(
        status: u16,
        body: &[u8],
        request_id: Option<String>,
        retry_after_header: Option<&str>,
    ) -> Self {
        let kind = ErrorKind::from_status(status);
        let parsed = ErrorBody::parse(body);

        let retry_after_secs = match kind {
            ErrorKind::RateLimit => retry_after_header
                .and_then(parse_retry_after)
                .or(parsed.retry_after),
            _ => None,
        };

        Self {
            kind,
            code: parsed
                .code
                .unwrap_or_else(|| kind.default_code(status).to_string()),
            message: parsed.message.unwrap_or_else(|| status_message(status)),
            status,
            request_id,
            details: parsed.details,
            retry_after_secs,
            retry_disabled: false,
        }
    }

    /// Whether a retry may succeed, using the default retryable-status set.
    pub fn is_retryable(&self) -> bool {
        if self.retry_disabled || !self.kind.is_transient() {
            return false;
        }
        match self.kind {
            ErrorKind::Network => true,
            _ => RETRYABLE_STATUSES.contains(&self.status),
        }
    }

    pub fn retry_after(&self) -> Option<u64> {
        self.retry_after_secs
    }

    pub fn docs_url(&self) -> String {
        format!("{}#{}", DOCS_BASE_URL, self.code)
    }
}

/// Parse a `Retry-After` value given in whole seconds.
///
/// HTTP-date values are not honoured; the caller falls back to backoff.
pub fn parse_retry_after(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

fn status_message(status: u16) -> String {
    match reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
    {
        Some(reason) => format!("Request failed with status {} ({})", status, reason),
        None => format!("Request failed with status {}", status),
    }
}

#[derive(Debug, Default)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<Value>,
    retry_after: Option<u64>,
}

impl ErrorBody {
    fn parse(body: &[u8]) -> Self {
        let Ok(value) = serde_json::from_slice::<Value>(body) else {
            return Self::default();
        };

        let inner = match value.get("error") {
            Some(Value::Object(_)) => &value["error"],
            Some(Value::String(message)) if !message.is_empty() => {
                return Self {
                    message: Some(message.clone()),
                    ..Self::default()
                };
            }
            _ => &value,
        };

        Self {
            code: non_empty_str(inner.get("code")),
            message: non_empty_str(inner.get("message")),
            details: inner.get("details").filter(|d| !d.is_null()).cloned(),
            retry_after: inner.get("retry_after").and_then(Value::as_u64),
        }
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Top-level SDK error.
#[derive(Error, Debug)]
pub enum SdkError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SdkError {
    /// The underlying API error, if this failure came from the transport.
    pub fn api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(e) => Some(e),
            _ => None,
        }
    }
}
