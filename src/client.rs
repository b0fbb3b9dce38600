//! High-level client: `LunaClient` with nested sub-client accessors.
//!
//! Each resource has its own sub-client in `domain/<name>/client.rs`.
//! This module keeps the builder, environment loading, and accessor methods.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::auth::token::DEFAULT_REFRESH_BUFFER;
use crate::auth::{ApiKeyAuth, AuthProvider, BoxError, RefreshCallback, TokenAuth, TokenPair};
use crate::domain::project::client::Projects;
use crate::domain::user::client::Users;
use crate::error::{ApiError, SdkError};
use crate::http::{LunaHttp, RequestConfig, Response, RetryConfig};
use crate::network::{DEFAULT_API_URL, DEFAULT_TIMEOUT, REFRESH_PATH};

// Re-export sub-client types for convenience.
pub use crate::domain::project::client::Projects as ProjectsClient;
pub use crate::domain::user::client::Users as UsersClient;

pub const ENV_API_KEY: &str = "LUNA_API_KEY";
pub const ENV_ACCESS_TOKEN: &str = "LUNA_ACCESS_TOKEN";
pub const ENV_REFRESH_TOKEN: &str = "LUNA_REFRESH_TOKEN";
pub const ENV_BASE_URL: &str = "LUNA_BASE_URL";
/// Milliseconds.
pub const ENV_TIMEOUT: &str = "LUNA_TIMEOUT";
pub const ENV_MAX_RETRIES: &str = "LUNA_MAX_RETRIES";

/// The primary entry point for the Luna SDK.
///
/// Provides nested sub-client accessors for each resource:
/// `client.users()`, `client.projects()`. Cheap to clone; clones share the
/// connection pool and credentials.
#[derive(Clone, Debug)]
pub struct LunaClient {
    pub(crate) http: LunaHttp,
}

impl LunaClient {
    pub fn builder() -> LunaClientBuilder {
        LunaClientBuilder::default()
    }

    // ── Sub-client accessors ─────────────────────────────────────────────

    pub fn users(&self) -> Users<'_> {
        Users { client: self }
    }

    pub fn projects(&self) -> Projects<'_> {
        Projects { client: self }
    }

    /// The underlying transport, for endpoints without a typed sub-client.
    pub fn http(&self) -> &LunaHttp {
        &self.http
    }

    /// Execute a raw request through the retrying transport.
    pub async fn request(&self, config: RequestConfig) -> Result<Response, ApiError> {
        self.http.request(config).await
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Builder
// ═════════════════════════════════════════════════════════════════════════════

pub struct LunaClientBuilder {
    base_url: String,
    api_key: Option<String>,
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    refresh_url: Option<String>,
    on_token_refresh: Option<RefreshCallback>,
    timeout: Duration,
    retry: RetryConfig,
    refresh_buffer: Duration,
    http_client: Option<reqwest::Client>,
}

impl Default for LunaClientBuilder {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            access_token: None,
            refresh_token: None,
            expires_at: None,
            refresh_url: None,
            on_token_refresh: None,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryConfig::default(),
            refresh_buffer: DEFAULT_REFRESH_BUFFER,
            http_client: None,
        }
    }
}

impl LunaClientBuilder {
    /// Start from `LUNA_*` environment variables.
    ///
    /// Blank or unparsable values are ignored. Builder calls made afterwards
    /// override whatever the environment provided.
    pub fn from_env() -> Self {
        Self::with_env(|name| std::env::var(name).ok())
    }

    /// Like [`LunaClientBuilder::from_env`] with a custom variable lookup.
    pub fn with_env<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut builder = Self::default();

        if let Some(url) = get(ENV_BASE_URL) {
            builder.base_url = url;
        }
        builder.api_key = get(ENV_API_KEY);
        builder.access_token = get(ENV_ACCESS_TOKEN);
        builder.refresh_token = get(ENV_REFRESH_TOKEN);

        if let Some(ms) = get(ENV_TIMEOUT).and_then(|v| v.parse::<u64>().ok()) {
            if ms > 0 {
                builder.timeout = Duration::from_millis(ms);
            }
        }
        if let Some(n) = get(ENV_MAX_RETRIES).and_then(|v| v.parse::<u32>().ok()) {
            builder.retry.max_retries = n;
        }
        builder
    }

    pub fn base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    /// Authenticate with a static API key. Takes precedence over tokens.
    pub fn api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    /// Authenticate with an OAuth pair. The refresh token may be omitted.
    pub fn tokens(mut self, access_token: &str, refresh_token: Option<&str>) -> Self {
        self.access_token = Some(access_token.to_string());
        self.refresh_token = refresh_token.map(str::to_string);
        self
    }

    pub fn expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Defaults to `<base_url>/v1/auth/refresh`.
    pub fn refresh_url(mut self, url: &str) -> Self {
        self.refresh_url = Some(url.to_string());
        self
    }

    pub fn on_token_refresh<F>(mut self, callback: F) -> Self
    where
        F: Fn(TokenPair) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.on_token_refresh = Some(Arc::new(callback));
        self
    }

    /// Per-attempt deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    /// Replace the whole retry configuration.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn refresh_buffer(mut self, buffer: Duration) -> Self {
        self.refresh_buffer = buffer;
        self
    }

    /// Share an existing `reqwest::Client` (and its connection pool).
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn build(self) -> Result<LunaClient, SdkError> {
        let base_url = self.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(SdkError::Config("base URL is required".to_string()));
        }

        let client = match self.http_client {
            Some(client) => client,
            None => reqwest::Client::builder()
                .pool_max_idle_per_host(10)
                .build()
                .map_err(|e| SdkError::Config(format!("failed to build HTTP client: {}", e)))?,
        };

        let auth: AuthProvider = match (self.api_key, self.access_token) {
            (Some(key), _) => ApiKeyAuth::new(key)?.into(),
            (None, Some(access_token)) => {
                let mut pair = TokenPair::new(access_token);
                pair.refresh_token = self.refresh_token;
                pair.expires_at = self.expires_at;

                let refresh_url = self
                    .refresh_url
                    .unwrap_or_else(|| format!("{}{}", base_url, REFRESH_PATH));
                // The refresh call shares the per-attempt deadline.
                let mut auth = TokenAuth::builder(pair, refresh_url)
                    .http_client(client.clone())
                    .refresh_buffer(self.refresh_buffer)
                    .refresh_timeout(self.timeout);
                if let Some(callback) = self.on_token_refresh {
                    auth = auth.on_refresh(callback);
                }
                auth.build()?.into()
            }
            (None, None) => {
                return Err(SdkError::Config(
                    "either an API key or an access token is required".to_string(),
                ))
            }
        };

        tracing::debug!(
            base_url = %base_url,
            auth = auth.auth_type(),
            max_retries = self.retry.max_retries,
            timeout_ms = self.timeout.as_millis() as u64,
            "Luna client created"
        );

        let http = LunaHttp::with_client(&base_url, auth, client)
            .with_retry(self.retry)
            .with_timeout(self.timeout);
        Ok(LunaClient { http })
    }
}
