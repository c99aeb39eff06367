//! Retry utilities with linear backoff for resilient page fetches.

use std::time::Duration;
use tokio::time::sleep;

use crate::sources::SourceError;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Backoff unit: the wait after the n-th failed attempt is `n * base_delay`
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1500),
        }
    }
}

impl RetryConfig {
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Delay after the given (1-based) failed attempt
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Failure classes worth another attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientError {
    Network,
    Timeout,
    /// Any other 5xx
    ServerError,
    ServiceUnavailable,
    GatewayTimeout,
    /// 429, the remote side is throttling us
    TooManyRequests,
}

impl TransientError {
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            429 => Some(Self::TooManyRequests),
            503 => Some(Self::ServiceUnavailable),
            504 => Some(Self::GatewayTimeout),
            500..=599 => Some(Self::ServerError),
            _ => None,
        }
    }

    /// `None` means the error is permanent
    pub fn from_source_error(err: &SourceError) -> Option<Self> {
        match err {
            SourceError::Network(_) => Some(Self::Network),
            SourceError::Timeout(_) => Some(Self::Timeout),
            SourceError::Http { status, .. } => Self::from_status(*status),
            _ => None,
        }
    }
}

/// Execute an async operation with retry logic
///
/// Transient failures are retried until `max_attempts` is reached, sleeping
/// `attempt * base_delay` in between. Anything else fails immediately.
pub async fn with_retry<T, F, Fut>(config: RetryConfig, mut operation: F) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, SourceError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempts = 0;

    loop {
        attempts += 1;

        match operation().await {
            Ok(result) => {
                if attempts > 1 {
                    tracing::info!(attempts, "Request recovered after transient failures");
                }
                return Ok(result);
            }
            Err(error) => match TransientError::from_source_error(&error) {
                Some(transient) if attempts < max_attempts => {
                    let delay = config.delay_after(attempts);
                    tracing::debug!(
                        attempt = attempts,
                        max_attempts,
                        kind = ?transient,
                        %error,
                        ?delay,
                        "Transient failure, retrying"
                    );
                    sleep(delay).await;
                }
                Some(_) => {
                    tracing::warn!(attempts, %error, "Giving up");
                    return Err(error);
                }
                None => return Err(error),
            },
        }
    }
}
