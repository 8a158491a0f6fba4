//! # Retry With Exponential Backoff
//!
//! Bounded retry of transient failures with exponential backoff and optional
//! jitter. Classification of "transient" is delegated to the configured
//! [`ErrorClassifier`]: non-retryable errors propagate immediately without
//! consuming further attempts.

use crate::error::Result;
use crate::resilience::classifier::ErrorClassifier;
use crate::resilience::config::RetryConfig;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Retries an operation according to a [`RetryConfig`].
///
/// The handler is cheap to clone and safe to share across calls; the config
/// is immutable after construction.
#[derive(Clone)]
pub struct RetryHandler {
    config: RetryConfig,
    classifier: Arc<dyn ErrorClassifier>,
}

impl std::fmt::Debug for RetryHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryHandler")
            .field("config", &self.config)
            .field("classifier", &self.classifier.name())
            .finish()
    }
}

impl RetryHandler {
    pub fn new(config: RetryConfig, classifier: Arc<dyn ErrorClassifier>) -> Self {
        Self { config, classifier }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute `operation`, retrying transient failures.
    ///
    /// Attempt numbering is 0-based: attempt 0 runs immediately, attempt n
    /// (n > 0) runs after sleeping `delay(n - 1)`. The last error propagates
    /// once attempts are exhausted. `context` names the operation for logs.
    pub async fn execute_with_retry<F, Fut, T>(&self, operation: F, context: &str) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = self.delay_for_attempt(attempt - 1);
                debug!(
                    context = %context,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "⏳ Backing off before retry"
                );
                tokio::time::sleep(delay).await;
            }

            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(context = %context, attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    let disposition = self.classifier.classify(&err, &self.config.retryable_kinds);
                    if !disposition.retryable {
                        warn!(
                            context = %context,
                            attempt,
                            error_kind = %disposition.kind,
                            error = %err,
                            "Non-retryable error, aborting"
                        );
                        return Err(err);
                    }
                    warn!(
                        context = %context,
                        attempt,
                        remaining = self.config.max_retries - attempt,
                        error_kind = %disposition.kind,
                        error = %err,
                        "Retryable error"
                    );
                    last_error = Some(err);
                }
            }
        }

        // Loop always records an error before falling through.
        Err(last_error.expect("retry loop exited without an error"))
    }

    /// Backoff delay before retry `n` (0-based), jitter applied when enabled.
    pub fn delay_for_attempt(&self, n: u32) -> Duration {
        let delay = backoff_delay(&self.config, n);
        if self.config.jitter {
            apply_jitter(delay)
        } else {
            delay
        }
    }
}

/// Pure exponential backoff: `min(base_delay * exponential_base^n, max_delay)`.
pub fn backoff_delay(config: &RetryConfig, n: u32) -> Duration {
    let factor = config.exponential_base.powi(n as i32);
    let delay = config.base_delay.as_secs_f64() * factor;
    let capped = delay.min(config.max_delay.as_secs_f64());
    Duration::from_secs_f64(capped.max(0.0))
}

/// ±25% uniform multiplicative jitter, clamped at zero.
fn apply_jitter(delay: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(0.75..=1.25);
    Duration::from_secs_f64((delay.as_secs_f64() * factor).max(0.0))
}
