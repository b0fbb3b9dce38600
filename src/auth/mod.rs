//! Authentication: credential providers for API keys and OAuth token pairs.
//!
//! ## Security Model
//!
//! - Credentials are owned by exactly one provider, which is owned by exactly
//!   one client. They are never exposed through a public accessor.
//! - Header values built from credentials are marked sensitive, and `Debug`
//!   output masks them.
//! - Token refresh is single-flight: any number of concurrent callers that
//!   find the token stale share one network refresh and observe its outcome.

pub mod api_key;
pub mod token;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};

use crate::error::{codes, ApiError};

pub use api_key::ApiKeyAuth;
pub use token::{TokenAuth, TokenAuthBuilder};

/// Boxed error returned by user callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Invoked with the new pair after every successful refresh, typically to
/// persist it. Runs detached; an error is logged and otherwise ignored.
pub type RefreshCallback = Arc<dyn Fn(TokenPair) -> Result<(), BoxError> + Send + Sync>;

/// An OAuth access/refresh token pair.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &crate::telemetry::REDACTED)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| crate::telemetry::REDACTED),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Supplies auth headers for every request attempt.
#[derive(Debug)]
pub enum AuthProvider {
    ApiKey(ApiKeyAuth),
    Token(TokenAuth),
}

impl AuthProvider {
    /// Headers for the next attempt. Refreshes first when the token is stale.
    pub async fn headers(&self) -> Result<HeaderMap, ApiError> {
        match self {
            Self::ApiKey(auth) => auth.headers(),
            Self::Token(auth) => auth.headers().await,
        }
    }

    pub async fn needs_refresh(&self) -> bool {
        match self {
            Self::ApiKey(_) => false,
            Self::Token(auth) => auth.needs_refresh().await,
        }
    }

    pub async fn refresh(&self) -> Result<(), ApiError> {
        match self {
            Self::ApiKey(_) => Ok(()),
            Self::Token(auth) => auth.refresh().await,
        }
    }

    pub fn auth_type(&self) -> &'static str {
        match self {
            Self::ApiKey(_) => "api_key",
            Self::Token(_) => "token",
        }
    }
}

impl From<ApiKeyAuth> for AuthProvider {
    fn from(auth: ApiKeyAuth) -> Self {
        Self::ApiKey(auth)
    }
}

impl From<TokenAuth> for AuthProvider {
    fn from(auth: TokenAuth) -> Self {
        Self::Token(auth)
    }
}

/// `Authorization: Bearer <credential>`, marked sensitive.
pub(crate) fn bearer_headers(credential: &str) -> Result<HeaderMap, ApiError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", credential)).map_err(|_| {
        ApiError::authentication(
            codes::AUTH_INVALID_KEY,
            "credential is not a valid header value",
            401,
        )
    })?;
    value.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}
