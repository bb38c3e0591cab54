//! Idempotency-gated retry for outbound requests.
//!
//! Only failures that never produced a response are retried, and only for
//! methods that are safe to repeat. A POST that times out may already have
//! been applied server-side, so it is surfaced to the caller untouched.

use std::future::Future;
use std::time::Duration;

use reqwest::Method;
use tracing::warn;

use crate::backoff::Backoff;
use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts are `max_retries + 1`.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(300),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.base_delay, self.max_delay)
    }
}

/// GET, or no method at all (which defaults to GET).
pub fn is_idempotent(method: Option<&Method>) -> bool {
    match method {
        None => true,
        Some(method) => method == Method::GET,
    }
}

pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    idempotent: bool,
    mut operation: F,
) -> Result<T, ClientError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let backoff = policy.backoff();
    let mut attempt = 0u32;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if idempotent && err.is_network() && attempt < policy.max_retries => {
                let delay = backoff.delay(attempt);
                warn!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "request did not reach server; retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
