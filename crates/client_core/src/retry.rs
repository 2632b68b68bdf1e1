use std::{future::Future, time::Duration};

use tracing::warn;

use crate::error::FetchResult;

/// Fixed retry budget with capped exponential backoff between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts made after the first one fails.
    pub retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub const fn new(retries: u32) -> Self {
        Self {
            retries,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
        }
    }

    pub const fn none() -> Self {
        Self::new(0)
    }

    /// Delay before retry number `attempt + 1`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

pub(crate) async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    label: &'static str,
    mut operation: F,
) -> FetchResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = FetchResult<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.retries => {
                let delay = policy.backoff(attempt);
                attempt += 1;
                warn!(
                    request = label,
                    attempt,
                    max_attempts = policy.retries + 1,
                    kind = err.kind(),
                    delay_ms = delay.as_millis() as u64,
                    "fetch: attempt failed; retrying: {err}"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                warn!(
                    request = label,
                    attempts = attempt + 1,
                    kind = err.kind(),
                    "fetch: retry budget exhausted: {err}"
                );
                return Err(err);
            }
        }
    }
}
