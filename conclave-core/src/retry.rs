//! Retry with exponential backoff for transient provider failures
//!
//! One job's agent invocation runs through here: transient failures (rate
//! limiting) are retried up to a fixed bound with exponentially growing
//! delays; anything else propagates immediately. Every attempt gets its
//! own status ticker, shut down before the attempt's outcome is acted on.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::status::{StatusSink, StatusTicker, TickerHandle};
use crate::{Error, Result};

/// Retry policy for one agent invocation
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry; doubles for each subsequent retry
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay before the retry following failed attempt `attempt`
    /// (0-indexed): `base_delay * 2^attempt`
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

/// Run `attempt` until it succeeds, fails non-transiently, or exhausts the
/// policy.
///
/// The closure receives a fresh `TickerHandle` per attempt; the backing
/// ticker is cancelled and awaited unconditionally before a retry sleep or
/// a return, so a failed attempt can never leak its background task.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    sink: &Arc<dyn StatusSink>,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut(TickerHandle) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    for attempt_idx in 0..policy.max_attempts {
        let ticker = StatusTicker::start(Arc::clone(sink));
        let outcome = attempt(ticker.handle()).await;
        ticker.shutdown().await;

        match outcome {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt_idx + 1 < policy.max_attempts => {
                let delay = policy.delay_after(attempt_idx);
                sink.progress(&format!(
                    "Rate limit hit, retrying in {:.1}s (attempt {}/{})...",
                    delay.as_secs_f64(),
                    attempt_idx + 1,
                    policy.max_attempts
                ));
                tracing::warn!(
                    attempt = attempt_idx + 1,
                    delay_secs = delay.as_secs_f64(),
                    error = %e,
                    "transient failure, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }

    // max_attempts of zero, or a policy bug; never reached for sane policies
    Err(Error::Agent(
        "Review did not produce a result after retries".to_string(),
    ))
}
