use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use tracing::{debug, warn};

pub const MAX_RETRIES: u32 = 3;
pub const BASE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            base_delay: BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff: `base_delay * 2^attempt`, attempt counted from 0.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// The parts of a response the retry loop looks at.
pub trait RateLimited {
    fn is_rate_limited(&self) -> bool;
    fn retry_after(&self) -> Option<Duration>;
}

impl RateLimited for reqwest::Response {
    fn is_rate_limited(&self) -> bool {
        self.status() == StatusCode::TOO_MANY_REQUESTS
    }

    fn retry_after(&self) -> Option<Duration> {
        self.headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_retry_after)
    }
}

/// `Retry-After` in delay-seconds form, fractions allowed. HTTP-date, negative and non-finite
/// values fall back to backoff.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let seconds = value.trim().parse::<f64>().ok()?;
    Duration::try_from_secs_f64(seconds).ok()
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Runs `make_request` until it returns a response that is not rate limited, or until
/// `policy.max_retries` retries are spent. The final response is returned as-is, 429 included.
/// Errors from `make_request` are returned immediately.
pub async fn with_rate_limit_retry<R, E, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    operation: &str,
    mut make_request: F,
) -> Result<R, E>
where
    R: RateLimited,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    let max_attempts = policy.max_retries + 1;
    let mut attempt = 0u32;
    loop {
        let response = make_request().await?;
        if !response.is_rate_limited() {
            if attempt > 0 {
                debug!(
                    operation = operation,
                    attempt = attempt + 1,
                    "Request succeeded after retry"
                );
            }
            return Ok(response);
        }
        if attempt >= policy.max_retries {
            warn!(
                operation = operation,
                attempts = max_attempts,
                "Rate limited after all retry attempts"
            );
            return Ok(response);
        }

        let delay = response
            .retry_after()
            .unwrap_or_else(|| policy.delay_for_attempt(attempt));
        warn!(
            operation = operation,
            attempt = attempt + 1,
            max_attempts = max_attempts,
            delay_ms = delay.as_millis() as u64,
            "Rate limited, will retry after delay"
        );
        sleeper.sleep(delay).await;
        attempt += 1;
    }
}
