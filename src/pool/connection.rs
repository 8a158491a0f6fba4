//! # Pooled Connection State
//!
//! One reusable client handle with its lifecycle state and rolling request
//! metrics. A connection is owned by exactly one pool and transitions only
//! through acquire/release/mark-unhealthy/close under the pool's lock.

use crate::pool::config::PoolConfig;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Lifecycle state of a pooled connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Available in the idle queue
    Idle,
    /// Exclusively owned by one caller
    Active,
    /// Flagged for removal
    Unhealthy,
    /// Removed from the pool
    Closed,
}

/// Rolling per-connection request metrics.
#[derive(Debug, Clone)]
pub struct ConnectionMetrics {
    pub created_at: Instant,
    pub last_used: Instant,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
}

impl ConnectionMetrics {
    fn new(now: Instant) -> Self {
        Self {
            created_at: now,
            last_used: now,
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
        }
    }

    /// Fraction of requests that succeeded; 1.0 before any traffic.
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 1.0;
        }
        self.successful_requests as f64 / self.total_requests as f64
    }
}

/// One client handle owned by a pool.
#[derive(Debug)]
pub struct PooledConnection<C> {
    pub id: Uuid,
    pub client: C,
    pub state: ConnectionState,
    pub metrics: ConnectionMetrics,
}

impl<C> PooledConnection<C> {
    pub fn new(client: C, now: Instant) -> Self {
        Self {
            id: Uuid::new_v4(),
            client,
            state: ConnectionState::Active,
            metrics: ConnectionMetrics::new(now),
        }
    }

    pub fn record_success(&mut self, now: Instant) {
        self.metrics.total_requests += 1;
        self.metrics.successful_requests += 1;
        self.metrics.last_used = now;
    }

    pub fn record_failure(&mut self, now: Instant) {
        self.metrics.total_requests += 1;
        self.metrics.failed_requests += 1;
        self.metrics.last_used = now;
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.metrics.created_at)
    }

    pub fn idle_time(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.metrics.last_used)
    }

    /// A connection is unhealthy when flagged, too old, or when its rolling
    /// success rate dropped below the configured floor with enough traffic
    /// to judge.
    pub fn is_unhealthy(&self, config: &PoolConfig, now: Instant) -> bool {
        if self.state == ConnectionState::Unhealthy || self.state == ConnectionState::Closed {
            return true;
        }
        if self.age(now) > config.max_connection_age {
            return true;
        }
        self.metrics.total_requests >= config.success_rate_min_requests
            && self.metrics.success_rate() < config.min_success_rate
    }

    /// Whether the pool should proactively remove this connection even
    /// without it being acquired.
    pub fn should_recycle(&self, config: &PoolConfig, now: Instant) -> bool {
        self.is_unhealthy(config, now)
            || self.idle_time(now) > config.max_idle_time
            || self.age(now) > config.max_connection_age
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PoolConfig {
        PoolConfig::default()
    }

    #[test]
    fn fresh_connection_is_healthy() {
        let now = Instant::now();
        let conn = PooledConnection::new((), now);
        assert_eq!(conn.state, ConnectionState::Active);
        assert!(!conn.is_unhealthy(&config(), now));
        assert_eq!(conn.metrics.success_rate(), 1.0);
    }

    #[test]
    fn low_success_rate_needs_enough_traffic() {
        let now = Instant::now();
        let mut conn = PooledConnection::new((), now);

        // 5 failures: below the 10-request floor, still healthy.
        for _ in 0..5 {
            conn.record_failure(now);
        }
        assert!(!conn.is_unhealthy(&config(), now));

        // 3 successes + 7 failures over 10 requests: 30% < 80%.
        for _ in 0..3 {
            conn.record_success(now);
        }
        for _ in 0..2 {
            conn.record_failure(now);
        }
        assert!(conn.is_unhealthy(&config(), now));
    }

    #[test]
    fn old_connections_are_recycled() {
        let now = Instant::now();
        let conn = PooledConnection::new((), now);
        let later = now + Duration::from_secs(3601);
        assert!(conn.is_unhealthy(&config(), later));
        assert!(conn.should_recycle(&config(), later));
    }

    #[test]
    fn idle_timeout_recycles_but_does_not_mark_unhealthy() {
        let now = Instant::now();
        let conn = PooledConnection::new((), now);
        let later = now + Duration::from_secs(301);
        assert!(!conn.is_unhealthy(&config(), later));
        assert!(conn.should_recycle(&config(), later));
    }
}
