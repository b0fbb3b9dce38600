//! Retry policies for HTTP requests.

use std::time::Duration;

use crate::error::{ApiError, ErrorKind};

/// HTTP statuses for which a retry is policy-permitted.
pub const RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Retry policy for a single request.
#[derive(Debug, Clone, Default)]
pub enum RetryPolicy {
    /// Use the transport's configured [`RetryConfig`].
    #[default]
    Default,
    /// No retries, regardless of the error.
    None,
    /// Per-request override.
    Custom(RetryConfig),
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not counting the initial request).
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries, before jitter.
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each retry.
    pub backoff_factor: f64,
    /// Uniform jitter applied to the computed delay, as a fraction (0.1 = ±10%).
    pub jitter: f64,
    /// HTTP status codes that trigger a retry.
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
            jitter: 0.1,
            retryable_statuses: RETRYABLE_STATUSES.to_vec(),
        }
    }
}

impl RetryConfig {
    /// A config that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Whether another attempt is allowed after `attempt` (0-indexed) failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Whether `error` is worth another attempt.
    ///
    /// Network failures carry no status and are always transient; everything
    /// else needs both a transient kind and a retryable status.
    pub fn is_retryable(&self, error: &ApiError) -> bool {
        if error.is_marked_non_retryable() || !error.kind.is_transient() {
            return false;
        }
        match error.kind {
            ErrorKind::Network => true,
            _ => self.retryable_statuses.contains(&error.status),
        }
    }

    /// Delay before the next attempt. A server-supplied `Retry-After` wins.
    pub fn delay(&self, attempt: u32, retry_after_secs: Option<u64>) -> Duration {
        match retry_after_secs {
            Some(secs) => Duration::from_secs(secs),
            None => self.delay_for_attempt(attempt),
        }
    }

    /// Exponential backoff for a given attempt (0-indexed), with jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_millis() as f64
            * self.backoff_factor.powi(attempt.min(i32::MAX as u32) as i32);
        let capped = base.min(self.max_delay.as_millis() as f64);

        let final_ms = if self.jitter > 0.0 {
            let jitter_range = capped * self.jitter;
            let jitter = (rand::random::<f64>() - 0.5) * 2.0 * jitter_range;
            (capped + jitter).max(0.0)
        } else {
            capped
        };

        Duration::from_millis(final_ms as u64)
    }
}
