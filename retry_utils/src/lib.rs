use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Classification of errors for retry strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryableError {
    /// 429 Rate Limit - retry with longer delays
    RateLimit,
    /// 5xx Server Error - retry with medium delays
    ServerError,
    /// Network timeout - retry with shorter delays
    Timeout,
    /// Other errors - don't retry
    Other,
}

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including initial attempt)
    pub max_attempts: u32,
    /// Delays for rate limit errors (milliseconds)
    pub rate_limit_delays_ms: Vec<u64>,
    /// Delays for server errors (milliseconds)
    pub server_error_delays_ms: Vec<u64>,
    /// Delays for timeout errors (milliseconds)
    pub timeout_delays_ms: Vec<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_delays_ms: vec![500, 1000, 2000],
            server_error_delays_ms: vec![300, 600, 1200],
            timeout_delays_ms: vec![500, 1000],
        }
    }
}

impl RetryConfig {
    /// A schedule where every class waits `base_ms`, `2*base_ms`, `3*base_ms`, ...
    /// between attempts. Used by the gallery loader for token-image lookups,
    /// which back off linearly regardless of how the lookup failed.
    pub fn linear(base_ms: u64, max_attempts: u32) -> Self {
        let delays: Vec<u64> = (1..=max_attempts as u64).map(|i| i * base_ms).collect();
        Self {
            max_attempts,
            rate_limit_delays_ms: delays.clone(),
            server_error_delays_ms: delays.clone(),
            timeout_delays_ms: delays,
        }
    }

    /// Get the delay for a specific retry attempt and error type
    fn get_delay(&self, attempt: u32, error_type: RetryableError) -> Option<Duration> {
        let delays = match error_type {
            RetryableError::RateLimit => &self.rate_limit_delays_ms,
            RetryableError::ServerError => &self.server_error_delays_ms,
            RetryableError::Timeout => &self.timeout_delays_ms,
            RetryableError::Other => return None, // Don't retry
        };

        // attempt is 0-indexed, delays array is also 0-indexed
        delays
            .get(attempt as usize)
            .map(|&delay_ms| Duration::from_millis(delay_ms))
    }
}

/// Retry an async operation with backoff
///
/// `classify_error` decides whether an error is worth retrying and which
/// delay schedule applies. Non-retryable errors and exhausted schedules
/// return the last error to the caller.
pub async fn retry_with_backoff<F, Fut, T, E>(
    mut operation: F,
    config: &RetryConfig,
    classify_error: impl Fn(&E) -> RetryableError,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!("✅ Operation succeeded after {} retry attempts", attempt);
                }
                return Ok(result);
            }
            Err(e) => {
                let error_type = classify_error(&e);

                if error_type == RetryableError::Other {
                    error!("❌ Operation failed with non-retryable error: {}", e);
                    return Err(e);
                }

                if attempt >= config.max_attempts {
                    error!(
                        "❌ Operation failed after {} attempts (max retries exhausted): {}",
                        attempt + 1,
                        e
                    );
                    return Err(e);
                }

                let delay = match config.get_delay(attempt, error_type) {
                    Some(d) => d,
                    None => {
                        error!("❌ No delay configured for attempt {}, failing", attempt);
                        return Err(e);
                    }
                };

                warn!(
                    "⚠️  Operation failed (attempt {}/{}): {} - Retrying in {}ms (error type: {:?})",
                    attempt + 1,
                    config.max_attempts + 1,
                    e,
                    delay.as_millis(),
                    error_type
                );

                tokio::time::sleep(delay).await;

                attempt += 1;
            }
        }
    }
}
