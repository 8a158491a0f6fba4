//! Runtime configuration for the resilience layer.
//!
//! These are the in-memory config values handed to [`CircuitBreaker`] and
//! [`RetryHandler`] instances. The serde-facing settings live in
//! [`crate::config`] and convert into these types after validation.
//!
//! [`CircuitBreaker`]: crate::resilience::CircuitBreaker
//! [`RetryHandler`]: crate::resilience::RetryHandler

use crate::error::ErrorKind;
use std::collections::HashSet;
use std::time::Duration;

/// Circuit breaker thresholds and timing.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,

    /// How long the circuit stays open before admitting a recovery probe
    pub recovery_timeout: Duration,

    /// Maximum concurrent probe calls admitted while half-open
    pub half_open_max_calls: u32,

    /// Successes required while half-open to close the circuit
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            half_open_max_calls: 3,
            success_threshold: 2,
        }
    }
}

/// Retry behavior for transient failures.
///
/// Immutable once constructed; shared by reference across calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Additional attempts after the first (0 = no retries)
    pub max_retries: u32,

    /// Delay before the first retry
    pub base_delay: Duration,

    /// Ceiling applied to the computed backoff delay
    pub max_delay: Duration,

    /// Multiplier applied per attempt
    pub exponential_base: f64,

    /// Apply ±25% uniform jitter to each delay
    pub jitter: bool,

    /// Error kinds considered retryable when the error itself does not
    /// declare a disposition
    pub retryable_kinds: HashSet<ErrorKind>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            exponential_base: 2.0,
            jitter: true,
            retryable_kinds: default_retryable_kinds(),
        }
    }
}

/// The sensible default retryable set: transient transport conditions only.
pub fn default_retryable_kinds() -> HashSet<ErrorKind> {
    [ErrorKind::Timeout, ErrorKind::Unavailable, ErrorKind::Throttled]
        .into_iter()
        .collect()
}
