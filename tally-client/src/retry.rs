//! Bounded retry with exponential backoff, shared by all remote clients.

use std::future::Future;
use std::time::Duration;

/// Retry knobs. Defaults are a starting contract, not a guarantee; the CLI
/// exposes them in config.toml.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after `attempt` (1-based) failed: doubles each
    /// time, capped at 30s.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .saturating_mul(factor)
            .min(Duration::from_secs(30))
    }
}

/// Run `op` up to `policy.max_attempts` times, sleeping the backoff delay
/// between failures. Returns the last error when all attempts fail.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut last_err = None;
    for attempt in 1..=attempts {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                last_err = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(policy.backoff_delay(attempt)).await;
                }
            }
        }
    }
    // attempts >= 1, so last_err is set on this path.
    Err(last_err.expect("at least one attempt"))
}
