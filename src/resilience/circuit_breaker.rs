//! # Circuit Breaker Implementation
//!
//! Per-endpoint fault isolation to prevent cascade failures when a remote
//! agent endpoint degrades. Classic three-state machine: Closed (normal
//! operation), Open (failing fast), and Half-Open (testing recovery with a
//! bounded number of probe calls).
//!
//! The breaker never masks errors: it decides admission, records outcomes,
//! and propagates the operation's own error untouched. Rejected calls fail
//! fast with [`InvokerError::CircuitOpen`] carrying the remaining cooldown.

use crate::error::{InvokerError, Result};
use crate::resilience::config::CircuitBreakerConfig;
use crate::resilience::metrics::CircuitBreakerStats;
use crate::utils::clock::{system_clock, SharedClock};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - calls are admitted
    Closed,
    /// Failure mode - calls are rejected without executing
    Open,
    /// Testing recovery - a bounded number of probe calls are admitted
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Mutable breaker state, always accessed under the instance mutex.
///
/// The admission check and the half-open in-flight increment happen inside
/// one critical section so concurrent callers can never admit more than
/// `half_open_max_calls` probes.
#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    half_open_calls: u32,
    last_failure_time: Option<Instant>,
    last_success_time: Option<Instant>,
    total_calls: u64,
    total_failures: u64,
    rejected_calls: u64,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            half_open_calls: 0,
            last_failure_time: None,
            last_success_time: None,
            total_calls: 0,
            total_failures: 0,
            rejected_calls: 0,
        }
    }
}

/// Per-endpoint circuit breaker.
///
/// One instance guards one logical endpoint identifier (an agent ARN, a
/// service name) and is the single source of truth for that endpoint's
/// call-admission decision. State mutations are serialized by a single
/// mutex that is never held across an await point.
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Endpoint identifier for logging and stats
    endpoint: String,

    /// Thresholds and timing
    config: CircuitBreakerConfig,

    /// All mutable state under one lock
    state: Mutex<BreakerState>,

    /// Injected time source
    clock: SharedClock,
}

impl CircuitBreaker {
    /// Create a breaker for the given endpoint with the given configuration.
    pub fn new(endpoint: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self::with_clock(endpoint, config, system_clock())
    }

    /// Create a breaker with an explicit time source.
    pub fn with_clock(
        endpoint: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: SharedClock,
    ) -> Self {
        let endpoint = endpoint.into();
        info!(
            endpoint = %endpoint,
            failure_threshold = config.failure_threshold,
            recovery_timeout_secs = config.recovery_timeout.as_secs_f64(),
            half_open_max_calls = config.half_open_max_calls,
            success_threshold = config.success_threshold,
            "🛡️ Circuit breaker initialized"
        );

        Self {
            endpoint,
            config,
            state: Mutex::new(BreakerState::new()),
            clock,
        }
    }

    /// Endpoint identifier this breaker guards.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Current circuit state.
    pub fn state(&self) -> CircuitState {
        self.state.lock().state
    }

    /// Execute an operation with circuit breaker protection.
    ///
    /// If admission is denied the operation is never invoked and the call
    /// fails fast with [`InvokerError::CircuitOpen`]. If admitted, the
    /// operation runs without any breaker lock held; its outcome is recorded
    /// afterwards and its error (if any) propagates unchanged.
    pub async fn call<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.try_admit()?;

        let result = operation().await;

        match &result {
            Ok(_) => self.on_success(),
            Err(err) => self.on_failure(err),
        }

        result
    }

    /// Admission decision plus any resulting state transition, atomically.
    fn try_admit(&self) -> Result<()> {
        let now = self.clock.now();
        let mut state = self.state.lock();

        match state.state {
            CircuitState::Closed => {
                state.total_calls += 1;
                Ok(())
            }
            CircuitState::Open => {
                let elapsed = state
                    .last_failure_time
                    .map(|t| now.saturating_duration_since(t))
                    .unwrap_or(Duration::MAX);

                if elapsed >= self.config.recovery_timeout {
                    // Cooldown elapsed: move to half-open and admit this
                    // call as the first probe.
                    state.state = CircuitState::HalfOpen;
                    state.half_open_calls = 1;
                    state.success_count = 0;
                    state.total_calls += 1;
                    info!(
                        endpoint = %self.endpoint,
                        success_threshold = self.config.success_threshold,
                        "🟡 Circuit breaker half-open (testing recovery)"
                    );
                    Ok(())
                } else {
                    state.rejected_calls += 1;
                    let retry_after = self.config.recovery_timeout - elapsed;
                    debug!(
                        endpoint = %self.endpoint,
                        retry_after_secs = retry_after.as_secs_f64(),
                        "Call rejected while circuit open"
                    );
                    Err(InvokerError::CircuitOpen {
                        endpoint: self.endpoint.clone(),
                        retry_after,
                    })
                }
            }
            CircuitState::HalfOpen => {
                if state.half_open_calls < self.config.half_open_max_calls {
                    state.half_open_calls += 1;
                    state.total_calls += 1;
                    Ok(())
                } else {
                    state.rejected_calls += 1;
                    let retry_after = state
                        .last_failure_time
                        .map(|t| {
                            self.config
                                .recovery_timeout
                                .saturating_sub(now.saturating_duration_since(t))
                        })
                        .unwrap_or(Duration::ZERO);
                    Err(InvokerError::CircuitOpen {
                        endpoint: self.endpoint.clone(),
                        retry_after,
                    })
                }
            }
        }
    }

    /// Record a successful admitted call.
    fn on_success(&self) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.last_success_time = Some(now);

        match state.state {
            CircuitState::Closed => {
                state.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                state.success_count += 1;
                if state.success_count >= self.config.success_threshold {
                    state.state = CircuitState::Closed;
                    state.failure_count = 0;
                    state.success_count = 0;
                    state.half_open_calls = 0;
                    info!(
                        endpoint = %self.endpoint,
                        "🟢 Circuit breaker closed (recovered)"
                    );
                }
            }
            CircuitState::Open => {
                // In-flight call from before the circuit opened; record only.
                warn!(endpoint = %self.endpoint, "Success recorded while circuit open");
            }
        }
    }

    /// Record a failed admitted call.
    fn on_failure(&self, err: &InvokerError) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.total_failures += 1;
        state.last_failure_time = Some(now);

        match state.state {
            CircuitState::Closed => {
                state.failure_count += 1;
                if state.failure_count >= self.config.failure_threshold {
                    state.state = CircuitState::Open;
                    state.half_open_calls = 0;
                    error!(
                        endpoint = %self.endpoint,
                        consecutive_failures = state.failure_count,
                        failure_threshold = self.config.failure_threshold,
                        error_kind = %err.kind(),
                        "🔴 Circuit breaker opened (failing fast)"
                    );
                }
            }
            CircuitState::HalfOpen => {
                // Any failure during recovery testing reopens immediately.
                state.state = CircuitState::Open;
                state.half_open_calls = 0;
                state.success_count = 0;
                error!(
                    endpoint = %self.endpoint,
                    error_kind = %err.kind(),
                    "🔴 Circuit breaker reopened (probe failed)"
                );
            }
            CircuitState::Open => {}
        }
    }

    /// Operator-triggered reset to the initial closed state.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        *state = BreakerState::new();
        warn!(endpoint = %self.endpoint, "Circuit breaker reset to closed");
    }

    /// Force the circuit open (emergency isolation).
    pub fn force_open(&self) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.state = CircuitState::Open;
        state.last_failure_time = Some(now);
        state.half_open_calls = 0;
        warn!(endpoint = %self.endpoint, "🚨 Circuit breaker forced open");
    }

    /// Force the circuit closed (emergency recovery).
    pub fn force_closed(&self) {
        let mut state = self.state.lock();
        state.state = CircuitState::Closed;
        state.failure_count = 0;
        state.success_count = 0;
        state.half_open_calls = 0;
        warn!(endpoint = %self.endpoint, "🚨 Circuit breaker forced closed");
    }

    /// Whether the breaker is closed with a low lifetime failure rate.
    pub fn is_healthy(&self) -> bool {
        let state = self.state.lock();
        if state.state != CircuitState::Closed {
            return false;
        }
        if state.total_calls < 10 {
            // Too few calls to judge
            return true;
        }
        (state.total_failures as f64 / state.total_calls as f64) < 0.1
    }

    /// Point-in-time stats snapshot.
    pub fn stats(&self) -> CircuitBreakerStats {
        let now = self.clock.now();
        let state = self.state.lock();
        CircuitBreakerStats {
            endpoint: self.endpoint.clone(),
            state: state.state,
            failure_count: state.failure_count,
            success_count: state.success_count,
            half_open_calls: state.half_open_calls,
            total_calls: state.total_calls,
            total_failures: state.total_failures,
            rejected_calls: state.rejected_calls,
            since_last_failure: state
                .last_failure_time
                .map(|t| now.saturating_duration_since(t)),
            since_last_success: state
                .last_success_time
                .map(|t| now.saturating_duration_since(t)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::clock::MockClock;
    use std::sync::Arc;

    fn test_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            half_open_max_calls: 2,
            success_threshold: 2,
        }
    }

    fn breaker_with_clock(config: CircuitBreakerConfig) -> (CircuitBreaker, MockClock) {
        let clock = MockClock::new();
        let breaker = CircuitBreaker::with_clock("agent-a", config, Arc::new(clock.clone()));
        (breaker, clock)
    }

    async fn fail(breaker: &CircuitBreaker) -> Result<&'static str> {
        breaker
            .call(|| async { Err(InvokerError::unavailable("connection refused")) })
            .await
    }

    async fn succeed(breaker: &CircuitBreaker) -> Result<&'static str> {
        breaker.call(|| async { Ok("ok") }).await
    }

    #[tokio::test]
    async fn starts_closed_and_admits_calls() {
        let (breaker, _clock) = breaker_with_clock(test_config());
        assert_eq!(breaker.state(), CircuitState::Closed);

        let result = succeed(&breaker).await;
        assert_eq!(result.unwrap(), "ok");

        let stats = breaker.stats();
        assert_eq!(stats.total_calls, 1);
        assert_eq!(stats.total_failures, 0);
    }

    #[tokio::test]
    async fn opens_after_failure_threshold() {
        let (breaker, _clock) = breaker_with_clock(test_config());

        for _ in 0..3 {
            let _ = fail(&breaker).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        // Rejected without executing; carries remaining cooldown.
        let result = succeed(&breaker).await;
        match result {
            Err(InvokerError::CircuitOpen { retry_after, .. }) => {
                assert!(retry_after <= Duration::from_secs(30));
                assert!(retry_after > Duration::ZERO);
            }
            other => panic!("expected CircuitOpen, got {other:?}"),
        }
        assert_eq!(breaker.stats().rejected_calls, 1);
    }

    #[tokio::test]
    async fn success_resets_failure_count_while_closed() {
        let (breaker, _clock) = breaker_with_clock(test_config());

        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;
        let _ = succeed(&breaker).await;
        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;

        // Never reached three consecutive failures.
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn recovery_probe_admitted_after_timeout() {
        let (breaker, clock) = breaker_with_clock(test_config());

        for _ in 0..3 {
            let _ = fail(&breaker).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        clock.advance(Duration::from_secs(31));

        // First call after cooldown is admitted as a half-open probe.
        let result = succeed(&breaker).await;
        assert!(result.is_ok());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        // Second success closes the circuit (success_threshold = 2).
        let result = succeed(&breaker).await;
        assert!(result.is_ok());
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_admits_bounded_probes() {
        let config = CircuitBreakerConfig {
            failure_threshold: 1,
            recovery_timeout: Duration::from_secs(10),
            half_open_max_calls: 2,
            success_threshold: 5,
        };
        let (breaker, clock) = breaker_with_clock(config);

        let _ = fail(&breaker).await;
        clock.advance(Duration::from_secs(11));

        // Two probes admitted, third rejected.
        assert!(succeed(&breaker).await.is_ok());
        assert!(succeed(&breaker).await.is_ok());
        let result = succeed(&breaker).await;
        assert!(matches!(result, Err(InvokerError::CircuitOpen { .. })));
    }

    #[tokio::test]
    async fn failure_during_half_open_reopens_immediately() {
        let config = CircuitBreakerConfig {
            failure_threshold: 1,
            recovery_timeout: Duration::from_secs(10),
            half_open_max_calls: 3,
            success_threshold: 2,
        };
        let (breaker, clock) = breaker_with_clock(config);

        let _ = fail(&breaker).await;
        clock.advance(Duration::from_secs(11));

        let _ = fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        // The cooldown restarts from the probe failure.
        let result = succeed(&breaker).await;
        assert!(matches!(result, Err(InvokerError::CircuitOpen { .. })));
    }

    #[tokio::test]
    async fn propagates_original_error_unchanged() {
        let (breaker, _clock) = breaker_with_clock(test_config());

        let result: Result<&str> = breaker
            .call(|| async { Err(InvokerError::invocation_failed("boom", Some(502))) })
            .await;

        match result {
            Err(InvokerError::InvocationFailed { status_code, .. }) => {
                assert_eq!(status_code, Some(502));
            }
            other => panic!("expected InvocationFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reset_and_force_operations() {
        let (breaker, _clock) = breaker_with_clock(test_config());

        breaker.force_open();
        assert_eq!(breaker.state(), CircuitState::Open);

        breaker.force_closed();
        assert_eq!(breaker.state(), CircuitState::Closed);

        for _ in 0..3 {
            let _ = fail(&breaker).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        breaker.reset();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.stats().total_calls, 0);
    }
}
