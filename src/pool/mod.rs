//! # Connection Pool Module
//!
//! Bounded pooling of reusable client handles per (region, service) pair,
//! with idle/health management and proactive recycling of stale or failing
//! connections.
//!
//! The pool never knows the wire protocol: client construction and health
//! probing are delegated to an injected [`ConnectionFactory`]. Acquisition is
//! scoped — the returned guard gives the connection back (healthy → idle,
//! otherwise discarded) on every exit path, including panics.

pub mod config;
pub mod connection;
pub mod health;
pub mod manager;
pub mod pool;

pub use config::PoolConfig;
pub use connection::{ConnectionMetrics, ConnectionState, PooledConnection};
pub use health::PoolHealthMonitor;
pub use manager::{ConnectionPoolManager, ManagerStatistics};
pub use pool::{ConnectionPool, PoolStatistics, PooledConnectionGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identity of one pool: the (region, service) pair it serves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolKey {
    pub region: String,
    pub service: String,
}

impl PoolKey {
    pub fn new(region: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            service: service.into(),
        }
    }
}

impl std::fmt::Display for PoolKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.region, self.service)
    }
}

/// Creates and probes client handles for a pool.
///
/// Implementations wrap whatever SDK/transport the application uses; the
/// pool only requires that clients are cheap to clone (the usual shape of
/// SDK clients holding an inner `Arc`).
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    type Client: Clone + Send + Sync + 'static;

    /// Establish a new client handle for the given pool.
    async fn connect(&self, key: &PoolKey) -> anyhow::Result<Self::Client>;

    /// Lightweight synthetic probe used by the background health monitor.
    async fn health_check(&self, key: &PoolKey, client: &Self::Client) -> anyhow::Result<()>;
}
