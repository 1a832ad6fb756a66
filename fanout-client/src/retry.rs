//! Retry executor for multi-step upstream workflows.
//!
//! Retries whole operations (a certificate upload, a batch push), not
//! individual cache calls. Delays grow exponentially from the base delay:
//! attempt 1 fails, wait `base`, attempt 2 fails, wait `2 * base`, and so
//! on. Authorization failures never retry - a bad credential will not get
//! better and hammering it risks an upstream lockout.

use std::future::Future;
use std::time::Duration;

use fanout_core::{FanoutError, FetchError, RetryError};
use tracing::warn;

/// Classifies errors the retry loop must give up on immediately.
pub trait RetryClass {
    fn is_authorization(&self) -> bool;
}

impl RetryClass for FetchError {
    fn is_authorization(&self) -> bool {
        FetchError::is_authorization(self)
    }
}

impl RetryClass for FanoutError {
    fn is_authorization(&self) -> bool {
        matches!(self, FanoutError::Fetch(e) if e.is_authorization())
    }
}

/// Backoff parameters for [`with_retry`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Delay after the given failed attempt (1-based): `base * 2^(n-1)`.
    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Run `operation` until it succeeds or the policy is exhausted.
///
/// `label` names the workflow in logs and in the returned error. The
/// operation is a factory so each attempt gets a fresh future.
pub async fn with_retry<T, E, F, Fut>(
    label: &str,
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    E: RetryClass + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(source) if source.is_authorization() => {
                warn!(label, %source, "authorization failure, not retrying");
                return Err(RetryError::Unauthorized {
                    label: label.to_string(),
                    source,
                });
            }
            Err(source) if attempt >= policy.max_attempts => {
                return Err(RetryError::Exhausted {
                    label: label.to_string(),
                    attempts: attempt,
                    source,
                });
            }
            Err(source) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    label,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    %source,
                    "attempt failed, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
