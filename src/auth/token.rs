//! OAuth token-pair credentials with single-flight refresh.

use std::sync::Arc;
use std::time::Duration;

use async_lock::{Mutex, RwLock};
use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

use super::{RefreshCallback, TokenPair};
use crate::error::{codes, ApiError};
use crate::network::{DEFAULT_TIMEOUT, REQUEST_ID_HEADER, USER_AGENT};

/// Refresh this long before the token actually expires.
pub const DEFAULT_REFRESH_BUFFER: Duration = Duration::from_secs(5 * 60);

type PendingRefresh = Shared<BoxFuture<'static, Result<(), ApiError>>>;

/// OAuth token-pair credential.
///
/// Cheap to clone; clones share the same tokens and refresh slot.
#[derive(Clone)]
pub struct TokenAuth {
    inner: Arc<Inner>,
}

struct Inner {
    tokens: RwLock<TokenPair>,
    /// The in-flight refresh, if any. Cleared once it settles.
    pending: Mutex<Option<PendingRefresh>>,
    http: reqwest::Client,
    refresh_url: String,
    refresh_buffer: Duration,
    refresh_timeout: Duration,
    on_refresh: Option<RefreshCallback>,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

impl TokenAuth {
    /// Create a provider that refreshes against `refresh_url`.
    ///
    /// Fails with `Authentication` if the access token is empty.
    pub fn new(tokens: TokenPair, refresh_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::builder(tokens, refresh_url).build()
    }

    /// Like [`TokenAuth::new`], reusing an existing HTTP client.
    pub fn with_http_client(
        tokens: TokenPair,
        refresh_url: impl Into<String>,
        http: reqwest::Client,
    ) -> Result<Self, ApiError> {
        Self::builder(tokens, refresh_url).http_client(http).build()
    }

    /// Configure a provider before it is built and shared.
    pub fn builder(tokens: TokenPair, refresh_url: impl Into<String>) -> TokenAuthBuilder {
        TokenAuthBuilder {
            tokens,
            refresh_url: refresh_url.into(),
            http: None,
            refresh_buffer: DEFAULT_REFRESH_BUFFER,
            refresh_timeout: DEFAULT_TIMEOUT,
            on_refresh: None,
        }
    }

    /// Whether the access token expires within the refresh buffer.
    ///
    /// Always false when no expiry is tracked.
    pub async fn needs_refresh(&self) -> bool {
        let expires_at = self.inner.tokens.read().await.expires_at;
        is_stale(expires_at, self.inner.refresh_buffer, Utc::now())
    }

    /// `Authorization: Bearer <access_token>`, refreshing first if stale.
    pub async fn headers(&self) -> Result<HeaderMap, ApiError> {
        if self.needs_refresh().await {
            self.join_refresh(false).await?;
        }
        let tokens = self.inner.tokens.read().await;
        super::bearer_headers(&tokens.access_token)
    }

    /// Refresh now. Concurrent callers share a single network call.
    pub async fn refresh(&self) -> Result<(), ApiError> {
        self.join_refresh(true).await
    }

    /// Join the in-flight refresh, or start one.
    ///
    /// Without `force`, staleness is re-checked under the slot lock so a
    /// caller arriving just after a refresh settled does not start another.
    async fn join_refresh(&self, force: bool) -> Result<(), ApiError> {
        let pending = {
            let mut slot = self.inner.pending.lock().await;
            match slot.as_ref() {
                Some(pending) => pending.clone(),
                None => {
                    if !force && !self.needs_refresh().await {
                        return Ok(());
                    }
                    let pending = run_refresh(self.inner.clone()).boxed().shared();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };

        let result = pending.clone().await;

        let mut slot = self.inner.pending.lock().await;
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&pending)) {
            *slot = None;
        }
        result
    }

    /// Snapshot of the current pair.
    pub async fn tokens(&self) -> TokenPair {
        self.inner.tokens.read().await.clone()
    }
}

impl std::fmt::Debug for TokenAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuth")
            .field("refresh_url", &self.inner.refresh_url)
            .field("refresh_buffer", &self.inner.refresh_buffer)
            .field("refresh_timeout", &self.inner.refresh_timeout)
            .finish_non_exhaustive()
    }
}

pub struct TokenAuthBuilder {
    tokens: TokenPair,
    refresh_url: String,
    http: Option<reqwest::Client>,
    refresh_buffer: Duration,
    refresh_timeout: Duration,
    on_refresh: Option<RefreshCallback>,
}

impl TokenAuthBuilder {
    /// Share an existing `reqwest::Client` for refresh calls.
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    /// How long before expiry a token counts as stale.
    pub fn refresh_buffer(mut self, buffer: Duration) -> Self {
        self.refresh_buffer = buffer;
        self
    }

    /// Deadline for the refresh call itself.
    pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    /// Register a callback for newly refreshed pairs.
    pub fn on_refresh(mut self, callback: RefreshCallback) -> Self {
        self.on_refresh = Some(callback);
        self
    }

    pub fn build(self) -> Result<TokenAuth, ApiError> {
        if self.tokens.access_token.is_empty() {
            return Err(ApiError::authentication(
                codes::AUTH_INVALID_KEY,
                "access token is required",
                401,
            ));
        }

        let http = match self.http {
            Some(http) => http,
            None => reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .build()
                .map_err(|e| {
                    ApiError::authentication(
                        codes::AUTH_INVALID_KEY,
                        format!("failed to build refresh client: {}", e),
                        0,
                    )
                })?,
        };

        Ok(TokenAuth {
            inner: Arc::new(Inner {
                tokens: RwLock::new(self.tokens),
                pending: Mutex::new(None),
                http,
                refresh_url: self.refresh_url,
                refresh_buffer: self.refresh_buffer,
                refresh_timeout: self.refresh_timeout,
                on_refresh: self.on_refresh,
            }),
        })
    }
}

fn is_stale(expires_at: Option<DateTime<Utc>>, buffer: Duration, now: DateTime<Utc>) -> bool {
    let Some(expires_at) = expires_at else {
        return false;
    };
    let buffer = chrono::Duration::from_std(buffer).unwrap_or_else(|_| chrono::Duration::zero());
    match now.checked_add_signed(buffer) {
        Some(deadline) => deadline >= expires_at,
        None => true,
    }
}

async fn run_refresh(inner: Arc<Inner>) -> Result<(), ApiError> {
    let refresh_token = inner
        .tokens
        .read()
        .await
        .refresh_token
        .clone()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            ApiError::authentication(codes::AUTH_INVALID_KEY, "no refresh token available", 401)
                .with_request_id(Some("local".to_string()))
        })?;

    tracing::debug!(url = %inner.refresh_url, "refreshing access token");

    let resp = inner
        .http
        .post(&inner.refresh_url)
        .timeout(inner.refresh_timeout)
        .json(&RefreshRequest {
            refresh_token: &refresh_token,
        })
        .send()
        .await
        .map_err(|e| {
            let cause = ApiError::from_reqwest(&e, None);
            tracing::warn!(error = %e, "token refresh request failed");
            ApiError::authentication(
                codes::AUTH_TOKEN_EXPIRED,
                format!("token refresh failed: {}", cause.message),
                0,
            )
        })?;

    let status = resp.status();
    let request_id = resp
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if !status.is_success() {
        tracing::warn!(status = status.as_u16(), request_id = ?request_id, "token refresh rejected");
        return Err(ApiError::authentication(
            codes::AUTH_TOKEN_EXPIRED,
            format!("refresh failed: {}", status.as_u16()),
            status.as_u16(),
        )
        .with_request_id(request_id));
    }

    let body: RefreshResponse = resp.json().await.map_err(|e| {
        ApiError::authentication(
            codes::AUTH_TOKEN_EXPIRED,
            format!("invalid refresh response: {}", e),
            status.as_u16(),
        )
        .with_request_id(request_id.clone())
    })?;

    let expires_at = body
        .expires_in
        .and_then(|secs| i64::try_from(secs).ok())
        .and_then(chrono::Duration::try_seconds)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl));

    let refreshed = {
        let mut tokens = inner.tokens.write().await;
        tokens.access_token = body.access_token;
        if let Some(rt) = body.refresh_token {
            tokens.refresh_token = Some(rt);
        }
        tokens.expires_at = expires_at;
        tokens.clone()
    };

    tracing::info!(expires_at = ?refreshed.expires_at, "access token refreshed");

    if let Some(callback) = &inner.on_refresh {
        notify_detached(callback.clone(), refreshed);
    }
    Ok(())
}

/// Run the refresh callback off the refresh path.
fn notify_detached(callback: RefreshCallback, tokens: TokenPair) {
    let run = move || {
        if let Err(e) = callback(tokens) {
            tracing::warn!(error = %e, "token refresh callback failed");
        }
    };
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(run);
        }
        Err(_) => {
            std::thread::spawn(run);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn provider(pair: TokenPair) -> TokenAuth {
        TokenAuth::new(pair, "http://127.0.0.1:9/v1/auth/refresh").unwrap()
    }

    #[test]
    fn test_is_stale() {
        let now = Utc::now();
        let buffer = DEFAULT_REFRESH_BUFFER;
        assert!(!is_stale(None, buffer, now));
        assert!(is_stale(Some(now - chrono::Duration::seconds(1)), buffer, now));
        assert!(is_stale(Some(now + chrono::Duration::seconds(299)), buffer, now));
        assert!(is_stale(Some(now + chrono::Duration::seconds(300)), buffer, now));
        assert!(!is_stale(Some(now + chrono::Duration::seconds(301)), buffer, now));
        assert!(!is_stale(Some(now + chrono::Duration::seconds(1)), Duration::ZERO, now));
    }

    #[test]
    fn test_empty_access_token_rejected() {
        let err = TokenAuth::new(TokenPair::new(""), "http://localhost").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authentication);
    }

    #[tokio::test]
    async fn test_headers_without_expiry_do_not_refresh() {
        let auth = provider(TokenPair::new("access-token").with_refresh_token("refresh-token"));
        assert!(!auth.needs_refresh().await);
        let headers = auth.headers().await.unwrap();
        assert_eq!(headers[reqwest::header::AUTHORIZATION], "Bearer access-token");
    }

    #[tokio::test]
    async fn test_expired_token_needs_refresh() {
        let auth = provider(
            TokenPair::new("access-token").with_expires_at(Utc::now() - chrono::Duration::hours(1)),
        );
        assert!(auth.needs_refresh().await);
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token() {
        let auth = provider(
            TokenPair::new("access-token").with_expires_at(Utc::now() - chrono::Duration::hours(1)),
        );
        let err = auth.headers().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authentication);
        assert_eq!(err.message, "no refresh token available");
        assert!(!err.is_retryable());

        // The failed attempt must not leave a stale slot behind.
        assert!(auth.inner.pending.lock().await.is_none());
    }

    #[tokio::test]
    async fn test_refresh_buffer_is_tunable() {
        let auth = provider(
            TokenPair::new("access-token")
                .with_expires_at(Utc::now() + chrono::Duration::minutes(2)),
        );
        assert!(auth.needs_refresh().await);

        let auth = TokenAuth::builder(
            TokenPair::new("access-token")
                .with_expires_at(Utc::now() + chrono::Duration::minutes(2)),
            "http://127.0.0.1:9/v1/auth/refresh",
        )
        .refresh_buffer(Duration::from_secs(60))
        .build()
        .unwrap();
        assert!(!auth.needs_refresh().await);
    }

    #[tokio::test]
    async fn test_builder_settings_survive_cloning() {
        let auth = TokenAuth::builder(TokenPair::new("access-token"), "http://localhost/refresh")
            .refresh_buffer(Duration::from_secs(10))
            .refresh_timeout(Duration::from_millis(250))
            .on_refresh(Arc::new(|_: TokenPair| -> Result<(), crate::auth::BoxError> { Ok(()) }))
            .build()
            .unwrap();
        let shared = auth.clone();
        assert_eq!(shared.inner.refresh_buffer, Duration::from_secs(10));
        assert_eq!(shared.inner.refresh_timeout, Duration::from_millis(250));
        assert!(shared.inner.on_refresh.is_some());
    }

    #[test]
    fn test_refresh_timeout_defaults_to_request_timeout() {
        let auth = provider(TokenPair::new("access-token"));
        assert_eq!(auth.inner.refresh_timeout, DEFAULT_TIMEOUT);
    }
}
