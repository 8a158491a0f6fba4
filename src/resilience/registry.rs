//! # Circuit Breaker Registry
//!
//! Explicit registry of per-endpoint circuit breakers with a defined
//! creation lifecycle: breakers are created lazily on first use for a new
//! endpoint key, share one default configuration, and live for the process
//! lifetime (removal is explicit and operator-triggered).

use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::resilience::config::CircuitBreakerConfig;
use crate::resilience::metrics::{CircuitBreakerStats, SystemResilienceStats};
use crate::utils::clock::{system_clock, SharedClock};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Concurrent endpoint → breaker map.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    default_config: CircuitBreakerConfig,
    clock: SharedClock,
}

impl CircuitBreakerRegistry {
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self::with_clock(default_config, system_clock())
    }

    pub fn with_clock(default_config: CircuitBreakerConfig, clock: SharedClock) -> Self {
        Self {
            breakers: DashMap::new(),
            default_config,
            clock,
        }
    }

    /// Breaker for `endpoint`, creating it on first use.
    pub fn breaker_for(&self, endpoint: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(endpoint) {
            return existing.clone();
        }

        // Entry API closes the check-then-insert race: the first writer
        // wins and later callers get its breaker.
        let breaker = self
            .breakers
            .entry(endpoint.to_string())
            .or_insert_with(|| {
                debug!(endpoint = %endpoint, "Creating circuit breaker for new endpoint");
                Arc::new(CircuitBreaker::with_clock(
                    endpoint,
                    self.default_config.clone(),
                    self.clock.clone(),
                ))
            });
        breaker.clone()
    }

    /// Breaker for `endpoint` if one already exists.
    pub fn get(&self, endpoint: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(endpoint).map(|entry| entry.clone())
    }

    /// Number of registered breakers.
    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// Reset one endpoint's breaker. Returns false if none exists.
    pub fn reset(&self, endpoint: &str) -> bool {
        match self.breakers.get(endpoint) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    /// Reset every registered breaker.
    pub fn reset_all(&self) {
        info!(count = self.breakers.len(), "Resetting all circuit breakers");
        for entry in self.breakers.iter() {
            entry.value().reset();
        }
    }

    /// Remove an endpoint's breaker entirely (operator-triggered).
    pub fn remove(&self, endpoint: &str) -> bool {
        self.breakers.remove(endpoint).is_some()
    }

    /// Aggregate stats across all breakers.
    pub fn system_stats(&self) -> SystemResilienceStats {
        let mut stats = SystemResilienceStats {
            total_breakers: 0,
            open_breakers: 0,
            half_open_breakers: 0,
            total_calls: 0,
            total_failures: 0,
            rejected_calls: 0,
            breakers: Default::default(),
        };

        for entry in self.breakers.iter() {
            let snapshot: CircuitBreakerStats = entry.value().stats();
            stats.total_breakers += 1;
            match snapshot.state {
                CircuitState::Open => stats.open_breakers += 1,
                CircuitState::HalfOpen => stats.half_open_breakers += 1,
                CircuitState::Closed => {}
            }
            stats.total_calls += snapshot.total_calls;
            stats.total_failures += snapshot.total_failures;
            stats.rejected_calls += snapshot.rejected_calls;
            stats.breakers.insert(entry.key().clone(), snapshot);
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvokerError;
    use std::time::Duration;

    fn registry() -> CircuitBreakerRegistry {
        CircuitBreakerRegistry::new(CircuitBreakerConfig {
            failure_threshold: 2,
            recovery_timeout: Duration::from_secs(60),
            half_open_max_calls: 1,
            success_threshold: 1,
        })
    }

    #[tokio::test]
    async fn breakers_are_created_lazily_and_reused() {
        let registry = registry();
        assert!(registry.is_empty());

        let first = registry.breaker_for("agent-a");
        let second = registry.breaker_for("agent-a");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);

        registry.breaker_for("agent-b");
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn breakers_isolate_endpoints() {
        let registry = registry();

        let failing = registry.breaker_for("agent-bad");
        for _ in 0..2 {
            let _ = failing
                .call(|| async { Err::<(), _>(InvokerError::unavailable("down")) })
                .await;
        }
        assert_eq!(failing.state(), CircuitState::Open);

        // The other endpoint is unaffected.
        let healthy = registry.breaker_for("agent-good");
        assert_eq!(healthy.state(), CircuitState::Closed);

        let stats = registry.system_stats();
        assert_eq!(stats.total_breakers, 2);
        assert_eq!(stats.open_breakers, 1);
        assert_eq!(stats.total_failures, 2);
    }

    #[tokio::test]
    async fn reset_clears_endpoint_state() {
        let registry = registry();
        let breaker = registry.breaker_for("agent-a");
        breaker.force_open();

        assert!(registry.reset("agent-a"));
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(!registry.reset("agent-missing"));
    }
}
