//! # Bounded Connection Pool
//!
//! Owns the idle queue and capacity accounting for one (region, service)
//! pair. Acquisition is scoped: [`PooledConnectionGuard`] returns the
//! connection on drop — healthy connections go back to the idle queue,
//! anything else is discarded — so no exit path can leak a connection or
//! hand one to two callers at once.

use crate::error::{InvokerError, Result};
use crate::pool::config::PoolConfig;
use crate::pool::connection::{ConnectionState, PooledConnection};
use crate::pool::{ConnectionFactory, PoolKey};
use crate::utils::clock::SharedClock;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Point-in-time statistics for one pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStatistics {
    pub region: String,
    pub service: String,
    pub idle_connections: usize,
    pub active_connections: usize,
    pub total_created: u64,
    pub total_recycled: u64,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
}

impl PoolStatistics {
    /// Fraction of requests through this pool that succeeded.
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 1.0;
        }
        self.successful_requests as f64 / self.total_requests as f64
    }
}

/// Mutable pool state, always accessed under the pool mutex.
#[derive(Debug)]
struct PoolInner<C> {
    idle: VecDeque<PooledConnection<C>>,
    active: usize,
    shutdown: bool,
    total_created: u64,
    total_recycled: u64,
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
}

impl<C> PoolInner<C> {
    fn new() -> Self {
        Self {
            idle: VecDeque::new(),
            active: 0,
            shutdown: false,
            total_created: 0,
            total_recycled: 0,
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
        }
    }
}

/// Bounded pool of reusable client handles for one (region, service) pair.
pub struct ConnectionPool<F: ConnectionFactory> {
    key: PoolKey,
    config: PoolConfig,
    factory: Arc<F>,
    inner: Arc<Mutex<PoolInner<F::Client>>>,
    clock: SharedClock,
}

impl<F: ConnectionFactory> std::fmt::Debug for ConnectionPool<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("key", &self.key)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<F: ConnectionFactory> ConnectionPool<F> {
    pub fn new(key: PoolKey, config: PoolConfig, factory: Arc<F>, clock: SharedClock) -> Self {
        info!(
            pool = %key,
            max_connections = config.max_connections_per_pool,
            "🔌 Connection pool created"
        );
        Self {
            key,
            config,
            factory,
            inner: Arc::new(Mutex::new(PoolInner::new())),
            clock,
        }
    }

    pub fn key(&self) -> &PoolKey {
        &self.key
    }

    /// Acquire a connection: reuse a healthy idle one, create a new one
    /// while under capacity, otherwise fail with `PoolExhausted`.
    pub async fn get_connection(&self) -> Result<PooledConnectionGuard<F::Client>> {
        let now = self.clock.now();

        {
            let mut inner = self.inner.lock();
            if inner.shutdown {
                return Err(InvokerError::unavailable(format!(
                    "connection pool {} is shut down",
                    self.key
                )));
            }

            while let Some(mut conn) = inner.idle.pop_front() {
                if conn.should_recycle(&self.config, now) {
                    conn.state = ConnectionState::Closed;
                    inner.total_recycled += 1;
                    debug!(pool = %self.key, connection_id = %conn.id, "Recycled stale idle connection");
                    continue;
                }
                conn.state = ConnectionState::Active;
                inner.active += 1;
                return Ok(self.guard(conn));
            }

            // Idle queue drained; pool size is now just the active count.
            if inner.active >= self.config.max_connections_per_pool {
                warn!(
                    pool = %self.key,
                    max_connections = self.config.max_connections_per_pool,
                    "Pool exhausted"
                );
                return Err(InvokerError::PoolExhausted {
                    pool_key: self.key.to_string(),
                    max_connections: self.config.max_connections_per_pool,
                });
            }

            // Reserve the slot before connecting so concurrent callers
            // cannot oversubscribe the pool while we await the factory.
            inner.active += 1;
        }

        match self.factory.connect(&self.key).await {
            Ok(client) => {
                let conn = PooledConnection::new(client, self.clock.now());
                debug!(pool = %self.key, connection_id = %conn.id, "Created connection");
                self.inner.lock().total_created += 1;
                Ok(self.guard(conn))
            }
            Err(err) => {
                self.inner.lock().active -= 1;
                Err(InvokerError::unavailable(format!(
                    "failed to connect to {}: {err:#}",
                    self.key
                )))
            }
        }
    }

    fn guard(&self, connection: PooledConnection<F::Client>) -> PooledConnectionGuard<F::Client> {
        PooledConnectionGuard {
            connection: Some(connection),
            inner: Arc::clone(&self.inner),
            config: self.config.clone(),
            clock: self.clock.clone(),
            pool_key: self.key.clone(),
            outcome: None,
            unhealthy: false,
        }
    }

    /// Proactively remove idle connections that are stale, too old or
    /// unhealthy. Returns the number removed.
    pub fn recycle_stale(&self) -> usize {
        let now = self.clock.now();
        let config = &self.config;
        let mut inner = self.inner.lock();
        let before = inner.idle.len();
        inner.idle.retain(|conn| !conn.should_recycle(config, now));
        let removed = before - inner.idle.len();
        inner.total_recycled += removed as u64;
        if removed > 0 {
            debug!(pool = %self.key, removed, "Recycled stale connections");
        }
        removed
    }

    /// Probe idle connections with the factory health check and remove any
    /// that fail. Returns the number removed. Connections acquired while the
    /// probe is in flight are left alone.
    pub async fn probe_idle(&self) -> usize {
        let probes: Vec<(Uuid, F::Client)> = {
            let inner = self.inner.lock();
            inner
                .idle
                .iter()
                .map(|conn| (conn.id, conn.client.clone()))
                .collect()
        };

        let mut failed = Vec::new();
        for (id, client) in probes {
            if let Err(err) = self.factory.health_check(&self.key, &client).await {
                warn!(pool = %self.key, connection_id = %id, error = %err, "Health probe failed");
                failed.push(id);
            }
        }

        if failed.is_empty() {
            return 0;
        }

        let mut inner = self.inner.lock();
        let before = inner.idle.len();
        inner.idle.retain(|conn| !failed.contains(&conn.id));
        let removed = before - inner.idle.len();
        inner.total_recycled += removed as u64;
        removed
    }

    /// Create idle connections until the pool holds at least
    /// `min_connections_per_pool`. Used by the health monitor to keep the
    /// pool warm.
    pub async fn ensure_min_connections(&self) {
        loop {
            {
                let inner = self.inner.lock();
                if inner.shutdown
                    || inner.idle.len() + inner.active >= self.config.min_connections_per_pool
                {
                    return;
                }
            }
            match self.factory.connect(&self.key).await {
                Ok(client) => {
                    let mut conn = PooledConnection::new(client, self.clock.now());
                    conn.state = ConnectionState::Idle;
                    let mut inner = self.inner.lock();
                    inner.total_created += 1;
                    inner.idle.push_back(conn);
                }
                Err(err) => {
                    warn!(pool = %self.key, error = %err, "Warm-up connect failed");
                    return;
                }
            }
        }
    }

    /// Stop handing out connections and drop everything idle.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock();
        inner.shutdown = true;
        let drained = inner.idle.len();
        inner.idle.clear();
        inner.total_recycled += drained as u64;
        info!(pool = %self.key, drained, "Connection pool shut down");
    }

    pub fn statistics(&self) -> PoolStatistics {
        let inner = self.inner.lock();
        PoolStatistics {
            region: self.key.region.clone(),
            service: self.key.service.clone(),
            idle_connections: inner.idle.len(),
            active_connections: inner.active,
            total_created: inner.total_created,
            total_recycled: inner.total_recycled,
            total_requests: inner.total_requests,
            successful_requests: inner.successful_requests,
            failed_requests: inner.failed_requests,
        }
    }
}

/// Scoped ownership of one pooled connection.
///
/// Callers report the outcome of their use via [`mark_success`] /
/// [`mark_failure`] / [`mark_unhealthy`]; on drop the connection goes back
/// to the idle queue if it is still healthy, and is discarded otherwise.
///
/// [`mark_success`]: PooledConnectionGuard::mark_success
/// [`mark_failure`]: PooledConnectionGuard::mark_failure
/// [`mark_unhealthy`]: PooledConnectionGuard::mark_unhealthy
pub struct PooledConnectionGuard<C: Clone + Send + Sync + 'static> {
    connection: Option<PooledConnection<C>>,
    inner: Arc<Mutex<PoolInner<C>>>,
    config: PoolConfig,
    clock: SharedClock,
    pool_key: PoolKey,
    outcome: Option<bool>,
    unhealthy: bool,
}

impl<C: Clone + Send + Sync + 'static> PooledConnectionGuard<C> {
    /// Clone of the underlying client handle.
    pub fn client(&self) -> C {
        self.connection
            .as_ref()
            .map(|conn| conn.client.clone())
            .expect("connection present until drop")
    }

    pub fn connection_id(&self) -> Option<Uuid> {
        self.connection.as_ref().map(|conn| conn.id)
    }

    /// Record a successful request on this connection.
    pub fn mark_success(&mut self) {
        self.outcome = Some(true);
    }

    /// Record a failed request on this connection.
    pub fn mark_failure(&mut self) {
        self.outcome = Some(false);
    }

    /// Flag the connection for removal instead of reuse.
    pub fn mark_unhealthy(&mut self) {
        self.unhealthy = true;
    }
}

impl<C: Clone + Send + Sync + 'static> Drop for PooledConnectionGuard<C> {
    fn drop(&mut self) {
        let Some(mut conn) = self.connection.take() else {
            return;
        };
        let now = self.clock.now();

        match self.outcome {
            Some(true) => conn.record_success(now),
            Some(false) => conn.record_failure(now),
            None => conn.metrics.last_used = now,
        }

        let mut inner = self.inner.lock();
        inner.active = inner.active.saturating_sub(1);
        match self.outcome {
            Some(true) => {
                inner.total_requests += 1;
                inner.successful_requests += 1;
            }
            Some(false) => {
                inner.total_requests += 1;
                inner.failed_requests += 1;
            }
            None => {}
        }

        if self.unhealthy {
            conn.state = ConnectionState::Unhealthy;
        }

        if inner.shutdown || self.unhealthy || conn.is_unhealthy(&self.config, now) {
            conn.state = ConnectionState::Closed;
            inner.total_recycled += 1;
            debug!(pool = %self.pool_key, connection_id = %conn.id, "Connection discarded on release");
        } else {
            conn.state = ConnectionState::Idle;
            inner.idle.push_back(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PoolKey;
    use crate::utils::clock::{system_clock, MockClock};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::time::Duration;

    /// Factory producing unit clients, with a switch to fail probes.
    struct TestFactory {
        connects: AtomicU32,
        probe_fails: AtomicBool,
    }

    impl TestFactory {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                connects: AtomicU32::new(0),
                probe_fails: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl ConnectionFactory for TestFactory {
        type Client = u32;

        async fn connect(&self, _key: &PoolKey) -> anyhow::Result<u32> {
            Ok(self.connects.fetch_add(1, Ordering::SeqCst))
        }

        async fn health_check(&self, _key: &PoolKey, _client: &u32) -> anyhow::Result<()> {
            if self.probe_fails.load(Ordering::SeqCst) {
                anyhow::bail!("probe failed");
            }
            Ok(())
        }
    }

    fn pool_with(
        config: PoolConfig,
        factory: Arc<TestFactory>,
    ) -> (ConnectionPool<TestFactory>, MockClock) {
        let clock = MockClock::new();
        let pool = ConnectionPool::new(
            PoolKey::new("us-east-1", "agent-runtime"),
            config,
            factory,
            Arc::new(clock.clone()),
        );
        (pool, clock)
    }

    #[tokio::test]
    async fn released_connections_are_reused() {
        let factory = TestFactory::new();
        let (pool, _clock) = pool_with(PoolConfig::default(), Arc::clone(&factory));

        let first_id = {
            let mut guard = pool.get_connection().await.unwrap();
            guard.mark_success();
            guard.connection_id()
        };

        let guard = pool.get_connection().await.unwrap();
        assert_eq!(guard.connection_id(), first_id);
        assert_eq!(factory.connects.load(Ordering::SeqCst), 1);

        let stats = pool.statistics();
        assert_eq!(stats.total_created, 1);
        assert_eq!(stats.successful_requests, 1);
    }

    #[tokio::test]
    async fn exhaustion_beyond_capacity() {
        let config = PoolConfig {
            max_connections_per_pool: 2,
            ..PoolConfig::default()
        };
        let (pool, _clock) = pool_with(config, TestFactory::new());

        let _a = pool.get_connection().await.unwrap();
        let _b = pool.get_connection().await.unwrap();
        let result = pool.get_connection().await;
        assert!(matches!(result, Err(InvokerError::PoolExhausted { .. })));
    }

    #[tokio::test]
    async fn unhealthy_release_discards_connection() {
        let factory = TestFactory::new();
        let (pool, _clock) = pool_with(PoolConfig::default(), Arc::clone(&factory));

        {
            let mut guard = pool.get_connection().await.unwrap();
            guard.mark_failure();
            guard.mark_unhealthy();
        }
        assert_eq!(pool.statistics().idle_connections, 0);
        assert_eq!(pool.statistics().total_recycled, 1);

        // Next acquisition creates a fresh connection.
        let _guard = pool.get_connection().await.unwrap();
        assert_eq!(factory.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn guard_returns_connection_on_early_drop() {
        let (pool, _clock) = pool_with(PoolConfig::default(), TestFactory::new());

        {
            let _guard = pool.get_connection().await.unwrap();
            // No outcome recorded; dropped on an early exit path.
        }
        let stats = pool.statistics();
        assert_eq!(stats.idle_connections, 1);
        assert_eq!(stats.active_connections, 0);
        assert_eq!(stats.total_requests, 0);
    }

    #[tokio::test]
    async fn stale_idle_connections_are_recycled() {
        let config = PoolConfig {
            max_idle_time: Duration::from_secs(10),
            ..PoolConfig::default()
        };
        let factory = TestFactory::new();
        let (pool, clock) = pool_with(config, Arc::clone(&factory));

        {
            let mut guard = pool.get_connection().await.unwrap();
            guard.mark_success();
        }
        clock.advance(Duration::from_secs(11));
        assert_eq!(pool.recycle_stale(), 1);
        assert_eq!(pool.statistics().idle_connections, 0);
    }

    #[tokio::test]
    async fn failed_probe_removes_idle_connection() {
        let factory = TestFactory::new();
        let (pool, _clock) = pool_with(PoolConfig::default(), Arc::clone(&factory));

        {
            let mut guard = pool.get_connection().await.unwrap();
            guard.mark_success();
        }
        assert_eq!(pool.probe_idle().await, 0);

        factory.probe_fails.store(true, Ordering::SeqCst);
        assert_eq!(pool.probe_idle().await, 1);
        assert_eq!(pool.statistics().idle_connections, 0);
    }

    #[tokio::test]
    async fn shutdown_drains_and_rejects() {
        let (pool, _clock) = pool_with(PoolConfig::default(), TestFactory::new());
        {
            let mut guard = pool.get_connection().await.unwrap();
            guard.mark_success();
        }
        pool.shutdown();
        assert_eq!(pool.statistics().idle_connections, 0);
        assert!(pool.get_connection().await.is_err());
    }

    #[tokio::test]
    async fn ensure_min_connections_warms_pool() {
        let config = PoolConfig {
            min_connections_per_pool: 3,
            ..PoolConfig::default()
        };
        let pool = ConnectionPool::new(
            PoolKey::new("us-east-1", "agent-runtime"),
            config,
            TestFactory::new(),
            system_clock(),
        );
        pool.ensure_min_connections().await;
        assert_eq!(pool.statistics().idle_connections, 3);
    }
}
