//! Static API-key credentials.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::HeaderMap;

use crate::error::{codes, ApiError};

const KEY_PREFIX: &str = "lk_";

const API_KEY_PATTERN: &str = r"^lk_(live|test|dev)_[a-zA-Z0-9]{32}$";

static API_KEY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(API_KEY_PATTERN).expect("API_KEY_REGEX should compile - this is a bug"));

/// Whether `key` matches `lk_(live|test|dev)_<32 alphanumerics>`.
pub fn is_valid_api_key(key: &str) -> bool {
    API_KEY_REGEX.is_match(key)
}

/// API-key credential. Validated once at construction; never expires.
#[derive(Clone)]
pub struct ApiKeyAuth {
    api_key: String,
}

impl ApiKeyAuth {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ApiError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(ApiError::authentication(
                codes::AUTH_INVALID_KEY,
                "API key is required",
                401,
            ));
        }
        if !is_valid_api_key(&api_key) {
            return Err(ApiError::authentication(
                codes::AUTH_INVALID_KEY,
                "invalid API key format, expected: lk_<env>_<key>",
                401,
            ));
        }
        Ok(Self { api_key })
    }

    /// The key's environment segment (`live`, `test` or `dev`).
    pub fn environment(&self) -> &str {
        self.api_key[KEY_PREFIX.len()..]
            .split('_')
            .next()
            .unwrap_or_default()
    }

    pub fn headers(&self) -> Result<HeaderMap, ApiError> {
        super::bearer_headers(&self.api_key)
    }
}

impl std::fmt::Debug for ApiKeyAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tail = &self.api_key[self.api_key.len() - 4..];
        f.debug_struct("ApiKeyAuth")
            .field("api_key", &format!("lk_{}_****{}", self.environment(), tail))
            .finish()
    }
}
