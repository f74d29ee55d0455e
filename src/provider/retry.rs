//! Exponential backoff for transient provider errors.
//!
//! Retries apply only to errors [`ProviderError::is_transient`] classifies as
//! worth repeating; permanent errors are returned immediately. Default policy
//! is 3 retries at 2s, 4s, 8s.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use super::ProviderError;

/// Configuration for exponential backoff retry.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not counting the initial attempt).
    pub max_retries: u32,

    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Cap for the exponentially growing delay.
    pub max_delay: Duration,

    /// Multiplier applied per attempt (typically 2.0).
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Default policy: 3 retries at 2s, 4s, 8s.
    pub const DEFAULT: Self = Self {
        max_retries: 3,
        initial_delay: Duration::from_secs(2),
        max_delay: Duration::from_secs(16),
        backoff_multiplier: 2.0,
    };

    /// Computes the delay for the given retry attempt (0-indexed), capped at
    /// `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = self.backoff_multiplier.powi(attempt as i32);
        let delay_secs = self.initial_delay.as_secs_f64() * multiplier;
        Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Runs `operation`, retrying transient failures with exponential backoff.
///
/// The last error is returned once retries are exhausted.
pub async fn retry_transient<T, F, Fut>(
    config: &RetryConfig,
    what: &str,
    mut operation: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < config.max_retries => {
                let delay = config.delay_for_attempt(attempt);
                debug!(
                    what,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient provider error, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
