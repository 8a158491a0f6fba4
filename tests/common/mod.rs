//! Shared helpers for integration tests.

use async_trait::async_trait;
use invoker_core::config::InvokerConfig;
use invoker_core::pool::{ConnectionFactory, PoolKey};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// Factory with scriptable connect/probe failures, counting connections.
#[derive(Default)]
pub struct TestAgentFactory {
    pub connects: AtomicU32,
    pub fail_connects: AtomicBool,
    pub fail_probes: AtomicBool,
}

impl TestAgentFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl ConnectionFactory for TestAgentFactory {
    type Client = u32;

    async fn connect(&self, key: &PoolKey) -> anyhow::Result<u32> {
        if self.fail_connects.load(Ordering::SeqCst) {
            anyhow::bail!("connect to {key} refused");
        }
        Ok(self.connects.fetch_add(1, Ordering::SeqCst))
    }

    async fn health_check(&self, _key: &PoolKey, _client: &u32) -> anyhow::Result<()> {
        if self.fail_probes.load(Ordering::SeqCst) {
            anyhow::bail!("probe failed");
        }
        Ok(())
    }
}

/// Configuration with timing fast enough for real-clock integration tests.
pub fn fast_test_config() -> InvokerConfig {
    let mut config = InvokerConfig::default();
    config.circuit_breaker.failure_threshold = 2;
    config.circuit_breaker.recovery_timeout_seconds = 0.1;
    config.circuit_breaker.half_open_max_calls = 2;
    config.circuit_breaker.success_threshold = 1;
    config.retry.max_retries = 0;
    config.retry.base_delay_seconds = 0.01;
    config.retry.jitter = false;
    config.cache.cleanup_interval_seconds = 0.05;
    config.pool.health_check_interval_seconds = 0.05;
    config
}
