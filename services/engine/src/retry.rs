//! services/engine/src/retry.rs
//!
//! Bounded retry with exponential backoff for transient gateway failures.
//!
//! Only errors the port taxonomy marks transient (transport faults, rate
//! limits) are retried; schema-validation and precondition failures return
//! immediately because retrying is unlikely to help.

use std::future::Future;
use std::time::Duration;

use studyforge_core::ports::{PortError, PortResult};
use tracing::{debug, warn};

/// Configuration for retry behavior on transient gateway errors.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial one).
    pub max_attempts: u32,
    /// Initial delay before the first retry.
    pub base_delay: Duration,
    /// Maximum delay between retries (backoff is capped here).
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
        }
    }
}

impl RetryConfig {
    /// The backoff delay applied before the given retry attempt (1-based).
    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        exp.min(self.max_delay)
    }
}

/// Runs `op` until it succeeds, fails terminally, or exhausts the attempt
/// budget. `op_name` only labels log lines.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, op_name: &str, mut op: F) -> PortResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PortResult<T>>,
{
    let mut last_err = None;
    for attempt in 0..config.max_attempts {
        if attempt > 0 {
            let delay = config.delay_for(attempt);
            debug!(op = op_name, attempt, ?delay, "retrying after transient failure");
            tokio::time::sleep(delay).await;
        }
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() => {
                warn!(op = op_name, attempt, error = %e, "transient gateway failure");
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err
        .unwrap_or_else(|| PortError::Unexpected(format!("{op_name}: all retries exhausted"))))
}
