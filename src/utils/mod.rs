//! Utility modules supporting the harvesting pipelines.
//!
//! - [`HttpClient`]: HTTP client carrying the user agent and retry policy
//! - [`RetryConfig`]: Configuration for retry logic with linear backoff
//! - [`with_retry`]: Execute an operation with automatic retry on transient errors
//! - [`validate`]: Endpoint URL validation and advisory item checks
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use bibharvest::sources::SourceError;
//! use bibharvest::utils::{with_retry, RetryConfig};
//!
//! # async fn fetch_data() -> Result<String, SourceError> { Ok("data".to_string()) }
//! # #[tokio::main]
//! # async fn main() -> Result<(), SourceError> {
//! let config = RetryConfig::default()
//!     .max_attempts(3)
//!     .base_delay(Duration::from_millis(1500));
//! let result = with_retry(config, || fetch_data()).await?;
//! # Ok(())
//! # }
//! ```

mod http;
mod retry;
pub mod validate;

pub use http::HttpClient;
pub use retry::{with_retry, RetryConfig, TransientError};
pub use validate::{
    check_required_fields, filter_excluded, find_invisible_characters, scan_titles, validate_url,
    InvisibleCharacter, ValidationError,
};
