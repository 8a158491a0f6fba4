//! Runtime configuration for connection pools.

use std::time::Duration;

/// Sizing, lifetime and health thresholds shared by every pool a manager
/// creates.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    /// Hard cap on idle + active connections per pool
    pub max_connections_per_pool: usize,

    /// Idle connections the health monitor keeps warm
    pub min_connections_per_pool: usize,

    /// Idle connections older than this are recycled
    pub max_idle_time: Duration,

    /// Connections older than this are recycled regardless of health
    pub max_connection_age: Duration,

    /// Interval between background health probe rounds
    pub health_check_interval: Duration,

    /// Rolling success rate below which a connection is unhealthy
    pub min_success_rate: f64,

    /// Requests required before the success rate is judged
    pub success_rate_min_requests: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections_per_pool: 10,
            min_connections_per_pool: 1,
            max_idle_time: Duration::from_secs(300),
            max_connection_age: Duration::from_secs(3600),
            health_check_interval: Duration::from_secs(60),
            min_success_rate: 0.8,
            success_rate_min_requests: 10,
        }
    }
}
