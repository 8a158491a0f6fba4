//! Metrics snapshots for the resilience layer.

use super::circuit_breaker::CircuitState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Point-in-time snapshot of a single circuit breaker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerStats {
    /// Endpoint this breaker guards
    pub endpoint: String,

    /// Current state at snapshot time
    pub state: CircuitState,

    /// Consecutive failures observed while closed
    pub failure_count: u32,

    /// Successes observed while half-open
    pub success_count: u32,

    /// Probe calls currently in flight while half-open
    pub half_open_calls: u32,

    /// Total calls admitted over the breaker's lifetime
    pub total_calls: u64,

    /// Total admitted calls that failed
    pub total_failures: u64,

    /// Calls rejected without execution
    pub rejected_calls: u64,

    /// Time since the last recorded failure, if any
    pub since_last_failure: Option<Duration>,

    /// Time since the last recorded success, if any
    pub since_last_success: Option<Duration>,
}

/// Aggregate view across every breaker in a registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemResilienceStats {
    pub total_breakers: usize,
    pub open_breakers: usize,
    pub half_open_breakers: usize,
    pub total_calls: u64,
    pub total_failures: u64,
    pub rejected_calls: u64,
    /// Per-endpoint snapshots keyed by endpoint id
    pub breakers: HashMap<String, CircuitBreakerStats>,
}

impl SystemResilienceStats {
    /// Fraction of admitted calls that succeeded, across all breakers.
    pub fn overall_success_rate(&self) -> f64 {
        if self.total_calls == 0 {
            return 1.0;
        }
        (self.total_calls - self.total_failures) as f64 / self.total_calls as f64
    }
}
