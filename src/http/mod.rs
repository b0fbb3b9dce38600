//! HTTP transport layer: `LunaHttp` with retry policies.

pub mod client;
pub mod retry;

pub use client::{generate_request_id, LunaHttp, RequestConfig, Response};
pub use retry::{RetryConfig, RetryPolicy, RETRYABLE_STATUSES};
