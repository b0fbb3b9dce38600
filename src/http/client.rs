//! Low-level HTTP transport: `LunaHttp`.
//!
//! Executes one logical call per [`LunaHttp::request`]: builds the URL, fetches
//! auth headers, sends the request under a deadline, classifies failures, and
//! retries per the active [`RetryConfig`]. Resource wrappers sit on top of this
//! and never re-classify its errors.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use rand::Rng;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::auth::AuthProvider;
use crate::error::{ApiError, SdkError};
use crate::http::retry::{RetryConfig, RetryPolicy};
use crate::network::{DEFAULT_TIMEOUT, REQUEST_ID_HEADER, USER_AGENT as SDK_USER_AGENT};
use crate::telemetry::{redact_headers, redact_json, redact_query};

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// One logical API call. Built fresh per call.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub method: Method,
    pub path: String,
    /// Query pairs, encoded in insertion order.
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Overrides the transport's default per-attempt timeout.
    pub timeout: Option<Duration>,
    pub retry: RetryPolicy,
}

impl RequestConfig {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            timeout: None,
            retry: RetryPolicy::Default,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Adds the pair only when `value` is present.
    pub fn query_opt<V: ToString>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.query(key, v),
            None => self,
        }
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn json<B: Serialize + ?Sized>(self, body: &B) -> Result<Self, serde_json::Error> {
        Ok(self.body(serde_json::to_value(body)?))
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// A successful (2xx) response.
#[derive(Debug, Clone)]
pub struct Response {
    /// Parsed body. Empty bodies are `Null`; non-JSON bodies are a string.
    pub data: Value,
    pub status: u16,
    pub headers: HeaderMap,
    /// Server-assigned request id, else the one this client generated.
    pub request_id: String,
}

impl Response {
    /// Decode the body into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }
}

/// HTTP transport for the Luna REST API.
///
/// Cheap to clone; clones share the connection pool and credential provider.
#[derive(Clone)]
pub struct LunaHttp {
    base_url: String,
    client: Client,
    auth: Arc<AuthProvider>,
    retry: RetryConfig,
    timeout: Duration,
}

impl LunaHttp {
    pub fn new(base_url: &str, auth: AuthProvider) -> Result<Self, SdkError> {
        let client = Client::builder()
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| SdkError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(base_url, auth, client))
    }

    /// Use a caller-supplied `reqwest::Client`.
    pub fn with_client(base_url: &str, auth: AuthProvider, client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            auth: Arc::new(auth),
            retry: RetryConfig::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth(&self) -> &AuthProvider {
        &self.auth
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Execute `config`, retrying transient failures.
    ///
    /// Dropping the returned future cancels the call, including any backoff
    /// sleep in progress.
    pub async fn request(&self, config: RequestConfig) -> Result<Response, ApiError> {
        let url = self.build_url(&config.path, &config.query);
        let request_id = generate_request_id();
        let retry: Cow<'_, RetryConfig> = match &config.retry {
            RetryPolicy::Default => Cow::Borrowed(&self.retry),
            RetryPolicy::None => Cow::Owned(RetryConfig::none()),
            RetryPolicy::Custom(c) => Cow::Borrowed(c),
        };
        let timeout = config.timeout.unwrap_or(self.timeout);
        let started = Instant::now();

        tracing::debug!(
            request_id = %request_id,
            method = %config.method,
            path = %config.path,
            query = ?redact_query(&config.query),
            body = ?config.body.as_ref().map(redact_json),
            "HTTP request started"
        );

        let mut attempt: u32 = 0;
        loop {
            match self.execute(&config, &url, &request_id, timeout).await {
                Ok(resp) => {
                    tracing::info!(
                        request_id = %resp.request_id,
                        method = %config.method,
                        path = %config.path,
                        status = resp.status,
                        attempts = attempt + 1,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "HTTP request completed"
                    );
                    return Ok(resp);
                }
                Err(e) => {
                    if retry.should_retry(attempt) && retry.is_retryable(&e) {
                        let delay = retry.delay(attempt, e.retry_after());
                        tracing::warn!(
                            request_id = %request_id,
                            attempt = attempt + 1,
                            max_retries = retry.max_retries,
                            status = e.status,
                            code = %e.code,
                            delay_ms = delay.as_millis() as u64,
                            "Retrying HTTP request"
                        );
                        futures_timer::Delay::new(delay).await;
                        attempt += 1;
                        continue;
                    }

                    tracing::error!(
                        request_id = ?e.request_id,
                        method = %config.method,
                        path = %config.path,
                        attempts = attempt + 1,
                        kind = %e.kind,
                        status = e.status,
                        code = %e.code,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "HTTP request failed"
                    );
                    return Err(e);
                }
            }
        }
    }

    /// [`LunaHttp::request`] and decode the body into `T`.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        config: RequestConfig,
    ) -> Result<T, SdkError> {
        let resp = self.request(config).await?;
        Ok(resp.json()?)
    }

    /// Full header set for one attempt: SDK defaults plus auth.
    ///
    /// May trigger a credential refresh.
    pub async fn build_headers(&self, request_id: &str) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(SDK_USER_AGENT));
        if let Ok(value) = HeaderValue::from_str(request_id) {
            headers.insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
        }
        headers.extend(self.auth.headers().await?);
        Ok(headers)
    }

    /// `base_url + path + ?query`, with keys and values percent-encoded.
    pub fn build_url(&self, path: &str, query: &[(String, String)]) -> String {
        let mut url = self.base_url.clone();
        if !path.starts_with('/') {
            url.push('/');
        }
        url.push_str(path);

        if !query.is_empty() {
            let encoded: Vec<String> = query
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect();
            url.push('?');
            url.push_str(&encoded.join("&"));
        }
        url
    }

    async fn execute(
        &self,
        config: &RequestConfig,
        url: &str,
        request_id: &str,
        timeout: Duration,
    ) -> Result<Response, ApiError> {
        // Auth failures are final; a refresh was already attempted if possible.
        let headers = self
            .build_headers(request_id)
            .await
            .map_err(ApiError::non_retryable)?;

        tracing::trace!(
            request_id = %request_id,
            headers = ?redact_headers(&headers),
            "sending HTTP request"
        );

        let mut req = self
            .client
            .request(config.method.clone(), url)
            .timeout(timeout)
            .headers(headers);
        if let Some(body) = &config.body {
            req = req.json(body);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(&e, Some(request_id.to_string())))?;

        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        let request_id = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| request_id.to_string());

        let body = resp
            .bytes()
            .await
            .map_err(|e| ApiError::from_reqwest(&e, Some(request_id.clone())))?;

        if !(200..300).contains(&status) {
            let retry_after = headers.get(RETRY_AFTER).and_then(|v| v.to_str().ok());
            return Err(ApiError::from_response(
                status,
                &body,
                Some(request_id),
                retry_after,
            ));
        }

        Ok(Response {
            data: parse_body(&body),
            status,
            headers,
            request_id,
        })
    }
}

impl std::fmt::Debug for LunaHttp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LunaHttp")
            .field("base_url", &self.base_url)
            .field("auth", &self.auth.auth_type())
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn parse_body(body: &[u8]) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

/// `req_<base36 unix millis><8 random base36 chars>`.
pub fn generate_request_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();
    let mut rng = rand::thread_rng();
    let random: String = (0..8)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("req_{}{}", to_base36(millis), random)
}

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36[(n % 36) as usize] as char);
        n /= 36;
    }
    digits.iter().rev().collect()
}
