//! # Resilient Invoker
//!
//! The pipeline facade. For one call: cache lookup → on miss, acquire a
//! pooled client → circuit breaker admission → retries with backoff around
//! the caller's operation → cache the success → scoped release of the
//! connection. The retried sequence counts as a single breaker outcome, so
//! a transient blip that recovers within the retry budget records success.

use crate::cache::{CacheSweeper, ResponseCache};
use crate::config::InvokerConfig;
use crate::error::{ErrorKind, Result};
use crate::execution::TaskDefinition;
use crate::invocation::context::InvocationContext;
use crate::pool::{ConnectionFactory, ConnectionPoolManager, PoolHealthMonitor};
use crate::resilience::{CircuitBreakerRegistry, RetryHandler, StandardErrorClassifier};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Composes the circuit breaker registry, retry handler, response cache and
/// connection pool manager into one call pipeline.
pub struct ResilientInvoker<F: ConnectionFactory> {
    breakers: Arc<CircuitBreakerRegistry>,
    retry: RetryHandler,
    cache: Arc<ResponseCache<Value>>,
    pools: Arc<ConnectionPoolManager<F>>,
}

impl<F: ConnectionFactory> std::fmt::Debug for ResilientInvoker<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientInvoker")
            .field("breakers", &self.breakers.len())
            .field("pools", &self.pools.pool_count())
            .finish_non_exhaustive()
    }
}

impl<F: ConnectionFactory> ResilientInvoker<F> {
    pub fn new(
        breakers: Arc<CircuitBreakerRegistry>,
        retry: RetryHandler,
        cache: Arc<ResponseCache<Value>>,
        pools: Arc<ConnectionPoolManager<F>>,
    ) -> Self {
        Self {
            breakers,
            retry,
            cache,
            pools,
        }
    }

    /// Assemble an invoker from validated configuration with the standard
    /// error classifier.
    pub fn from_config(config: &InvokerConfig, factory: Arc<F>) -> Self {
        Self::new(
            Arc::new(CircuitBreakerRegistry::new(config.circuit_breaker_config())),
            RetryHandler::new(
                config.retry_config(),
                Arc::new(StandardErrorClassifier::default()),
            ),
            Arc::new(ResponseCache::new(config.cache_config())),
            Arc::new(ConnectionPoolManager::new(config.pool_config(), factory)),
        )
    }

    pub fn breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.breakers
    }

    pub fn cache(&self) -> &Arc<ResponseCache<Value>> {
        &self.cache
    }

    pub fn pools(&self) -> &Arc<ConnectionPoolManager<F>> {
        &self.pools
    }

    pub fn retry(&self) -> &RetryHandler {
        &self.retry
    }

    /// Start the cache sweeper and pool health monitor.
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        BackgroundTasks {
            cache_sweeper: self.cache.start_sweeper(),
            health_monitor: PoolHealthMonitor::start(Arc::clone(&self.pools)),
        }
    }

    /// Execute one remote operation through the full pipeline.
    ///
    /// `operation` receives a clone of the pooled client handle and is the
    /// only thing that touches the wire; everything around it is admission,
    /// retry and bookkeeping. The operation may be invoked multiple times
    /// (retries), never concurrently.
    #[instrument(skip_all, fields(operation = %ctx.operation, endpoint = %ctx.endpoint))]
    pub async fn invoke<Op, Fut>(&self, ctx: &InvocationContext, operation: Op) -> Result<Value>
    where
        Op: Fn(F::Client) -> Fut + Send + Sync,
        Fut: Future<Output = Result<Value>> + Send,
    {
        if ctx.use_cache {
            return self
                .cache
                .get_or_compute(
                    &ctx.operation,
                    &ctx.parameters,
                    Some(&ctx.endpoint),
                    ctx.cache_ttl,
                    || self.dispatch(ctx, &operation),
                )
                .await;
        }
        self.dispatch(ctx, &operation).await
    }

    /// The uncached pipeline: pool → breaker → retry → operation.
    async fn dispatch<Op, Fut>(&self, ctx: &InvocationContext, operation: &Op) -> Result<Value>
    where
        Op: Fn(F::Client) -> Fut + Send + Sync,
        Fut: Future<Output = Result<Value>> + Send,
    {
        let mut guard = self.pools.get_client(&ctx.service, &ctx.region).await?;
        let client = guard.client();
        debug!(connection_id = ?guard.connection_id(), "Dispatching remote operation");

        let breaker = self.breakers.breaker_for(&ctx.endpoint);
        let retry = &self.retry;
        let result = breaker
            .call(|| async {
                retry
                    .execute_with_retry(|| operation(client.clone()), &ctx.operation)
                    .await
            })
            .await;

        match &result {
            Ok(_) => guard.mark_success(),
            Err(err) => {
                guard.mark_failure();
                // Transport-level failures taint the connection itself.
                if matches!(err.kind(), ErrorKind::Unavailable | ErrorKind::Timeout) {
                    guard.mark_unhealthy();
                }
            }
        }

        result
    }
}

impl<F: ConnectionFactory> ResilientInvoker<F> {
    /// Wrap one pipeline call as a [`TaskDefinition`] for batch execution.
    ///
    /// Each task attempt runs the full pipeline (cache, pool, breaker,
    /// retry) for its own context.
    pub fn task_definition<Op, Fut>(
        self: &Arc<Self>,
        task_id: impl Into<String>,
        ctx: InvocationContext,
        operation: Op,
    ) -> TaskDefinition
    where
        Op: Fn(F::Client) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let invoker = Arc::clone(self);
        let ctx = Arc::new(ctx);
        let operation = Arc::new(operation);
        TaskDefinition::new(task_id, move || {
            let invoker = Arc::clone(&invoker);
            let ctx = Arc::clone(&ctx);
            let operation = Arc::clone(&operation);
            async move { invoker.invoke(&ctx, |client| (*operation)(client)).await }
        })
    }
}

/// Handles for the invoker's background jobs; shut down at process exit.
pub struct BackgroundTasks {
    cache_sweeper: CacheSweeper,
    health_monitor: PoolHealthMonitor,
}

impl BackgroundTasks {
    /// Stop both background tasks with bounded joins.
    pub async fn shutdown(self) {
        self.cache_sweeper.shutdown().await;
        self.health_monitor.shutdown().await;
    }
}
