use ocsmetrics_core::RunConfig;
use ocsmetrics_types::FetchErrorKind;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts = max_retries + 1
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

pub trait BackoffPolicy {
    fn delay_for_attempt(&self, attempt: u32) -> Duration;
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff_ms: 250,
            max_backoff_ms: 8_000,
        }
    }
}

impl BackoffPolicy for RetryPolicy {
    /// Exponential: base, 2x base, 4x base, ... capped at `max_backoff_ms`
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let delay = self.base_backoff_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(delay.min(self.max_backoff_ms))
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_backoff_ms: config.fetch.backoff_base_ms,
            max_backoff_ms: config.fetch.backoff_max_ms,
        }
    }

    pub fn no_backoff(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retrying after `attempt` failed with `kind`.
    ///
    /// A rate limit with `Retry-After` waits at least that long.
    pub fn delay_after(&self, attempt: u32, kind: &FetchErrorKind) -> Duration {
        let backoff = self.delay_for_attempt(attempt);
        match kind {
            FetchErrorKind::RateLimited {
                retry_after_secs: Some(secs),
            } => backoff.max(Duration::from_secs(*secs)),
            _ => backoff,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError {
    /// Fatal, or still failing after the last permitted attempt
    Failed { kind: FetchErrorKind, attempts: u32 },
    /// Cancelled while waiting to retry
    Cancelled,
}

/// Run `op` until it succeeds, fails fatally or runs out of attempts.
///
/// Backoff sleeps race the cancellation token; an attempt already in flight
/// is never interrupted.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, RetryError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, FetchErrorKind>>,
{
    let mut attempt = 1;
    loop {
        let kind = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(kind) => kind,
        };

        if !kind.is_retryable() || attempt >= policy.max_attempts() {
            return Err(RetryError::Failed {
                kind,
                attempts: attempt,
            });
        }

        let delay = policy.delay_after(attempt, &kind);
        tracing::warn!(
            attempt,
            max_attempts = policy.max_attempts(),
            delay_ms = delay.as_millis() as u64,
            error = %kind,
            "page request failed, retrying"
        );

        tokio::select! {
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}
