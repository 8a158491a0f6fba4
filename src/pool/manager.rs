//! # Connection Pool Manager
//!
//! Pool-of-pools keyed by (region, service). Pools are created lazily on
//! first use and share one configuration, factory and clock. The manager is
//! the single place the rest of the crate asks for a client handle.

use crate::error::Result;
use crate::pool::config::PoolConfig;
use crate::pool::pool::{ConnectionPool, PoolStatistics, PooledConnectionGuard};
use crate::pool::{ConnectionFactory, PoolKey};
use crate::utils::clock::{system_clock, SharedClock};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Aggregate statistics across every pool the manager owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerStatistics {
    pub total_pools: usize,
    pub idle_connections: usize,
    pub active_connections: usize,
    pub total_requests: u64,
    pub successful_requests: u64,
    /// Per-pool snapshots keyed by "region/service"
    pub pools: HashMap<String, PoolStatistics>,
}

impl ManagerStatistics {
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 1.0;
        }
        self.successful_requests as f64 / self.total_requests as f64
    }
}

/// Owns one [`ConnectionPool`] per (region, service) pair.
pub struct ConnectionPoolManager<F: ConnectionFactory> {
    pools: DashMap<PoolKey, Arc<ConnectionPool<F>>>,
    config: PoolConfig,
    factory: Arc<F>,
    clock: SharedClock,
}

impl<F: ConnectionFactory> std::fmt::Debug for ConnectionPoolManager<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPoolManager")
            .field("pools", &self.pools.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<F: ConnectionFactory> ConnectionPoolManager<F> {
    pub fn new(config: PoolConfig, factory: Arc<F>) -> Self {
        Self::with_clock(config, factory, system_clock())
    }

    pub fn with_clock(config: PoolConfig, factory: Arc<F>, clock: SharedClock) -> Self {
        Self {
            pools: DashMap::new(),
            config,
            factory,
            clock,
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Pool for the given (service, region), created lazily.
    pub fn pool_for(&self, service: &str, region: &str) -> Arc<ConnectionPool<F>> {
        let key = PoolKey::new(region, service);
        if let Some(existing) = self.pools.get(&key) {
            return existing.clone();
        }
        let pool = self.pools.entry(key.clone()).or_insert_with(|| {
            debug!(pool = %key, "Creating connection pool for new (region, service)");
            Arc::new(ConnectionPool::new(
                key.clone(),
                self.config.clone(),
                Arc::clone(&self.factory),
                self.clock.clone(),
            ))
        });
        pool.clone()
    }

    /// Scoped client acquisition from the matching pool.
    pub async fn get_client(
        &self,
        service: &str,
        region: &str,
    ) -> Result<PooledConnectionGuard<F::Client>> {
        self.pool_for(service, region).get_connection().await
    }

    /// Every pool currently registered.
    pub fn pools(&self) -> Vec<Arc<ConnectionPool<F>>> {
        self.pools.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// Aggregate statistics across all pools.
    pub fn get_pool_statistics(&self) -> ManagerStatistics {
        let mut stats = ManagerStatistics {
            total_pools: 0,
            idle_connections: 0,
            active_connections: 0,
            total_requests: 0,
            successful_requests: 0,
            pools: HashMap::new(),
        };

        for entry in self.pools.iter() {
            let snapshot = entry.value().statistics();
            stats.total_pools += 1;
            stats.idle_connections += snapshot.idle_connections;
            stats.active_connections += snapshot.active_connections;
            stats.total_requests += snapshot.total_requests;
            stats.successful_requests += snapshot.successful_requests;
            stats.pools.insert(entry.key().to_string(), snapshot);
        }

        stats
    }

    /// Shut down every pool; subsequent acquisitions fail.
    pub fn shutdown_all(&self) {
        info!(pools = self.pools.len(), "Shutting down all connection pools");
        for entry in self.pools.iter() {
            entry.value().shutdown();
        }
    }
}
