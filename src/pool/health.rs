//! # Background Pool Health Monitor
//!
//! One long-lived timer task per manager: each round it recycles stale idle
//! connections, probes the remaining idle ones with the factory health
//! check, and tops pools back up to their configured minimum. Runs
//! independently of request traffic and stops via a cancellation signal
//! with a bounded join.

use crate::pool::manager::ConnectionPoolManager;
use crate::pool::ConnectionFactory;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the background health task.
pub struct PoolHealthMonitor {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl PoolHealthMonitor {
    /// Start monitoring every pool the manager owns (including pools created
    /// after the monitor starts).
    pub fn start<F: ConnectionFactory>(manager: Arc<ConnectionPoolManager<F>>) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let interval_duration = manager.config().health_check_interval;

        info!(
            interval_secs = interval_duration.as_secs_f64(),
            "🩺 Pool health monitor started"
        );

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval_duration);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        Self::run_round(&manager).await;
                    }
                    _ = shutdown_rx.changed() => {
                        debug!("Pool health monitor shutting down");
                        break;
                    }
                }
            }
        });

        Self {
            shutdown: shutdown_tx,
            handle,
        }
    }

    async fn run_round<F: ConnectionFactory>(manager: &ConnectionPoolManager<F>) {
        for pool in manager.pools() {
            let recycled = pool.recycle_stale();
            let failed_probes = pool.probe_idle().await;
            pool.ensure_min_connections().await;
            if recycled > 0 || failed_probes > 0 {
                debug!(
                    pool = %pool.key(),
                    recycled,
                    failed_probes,
                    "Health round removed connections"
                );
            }
        }
    }

    /// Signal the monitor to stop and wait for it, bounded.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if tokio::time::timeout(JOIN_TIMEOUT, self.handle).await.is_err() {
            warn!("Pool health monitor did not stop within join timeout");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::config::PoolConfig;
    use crate::pool::PoolKey;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FlakyFactory {
        probe_fails: AtomicBool,
    }

    #[async_trait]
    impl ConnectionFactory for FlakyFactory {
        type Client = ();

        async fn connect(&self, _key: &PoolKey) -> anyhow::Result<()> {
            Ok(())
        }

        async fn health_check(&self, _key: &PoolKey, _client: &()) -> anyhow::Result<()> {
            if self.probe_fails.load(Ordering::SeqCst) {
                anyhow::bail!("probe failed");
            }
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_removes_connections_failing_probes() {
        let factory = Arc::new(FlakyFactory {
            probe_fails: AtomicBool::new(false),
        });
        let config = PoolConfig {
            health_check_interval: Duration::from_secs(1),
            // Keep the monitor from re-warming the pool for this test.
            min_connections_per_pool: 0,
            ..PoolConfig::default()
        };
        let manager = Arc::new(ConnectionPoolManager::new(config, Arc::clone(&factory)));

        {
            let mut guard = manager.get_client("agent-runtime", "us-east-1").await.unwrap();
            guard.mark_success();
        }
        let pool = manager.pool_for("agent-runtime", "us-east-1");
        assert_eq!(pool.statistics().idle_connections, 1);

        let monitor = PoolHealthMonitor::start(Arc::clone(&manager));
        factory.probe_fails.store(true, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(pool.statistics().idle_connections, 0);

        monitor.shutdown().await;
    }
}
