#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Invoker Core Rust
//!
//! High-performance resilience and orchestration core that sits between
//! application logic and a remote, possibly-unreliable agent/service
//! endpoint.
//!
//! ## Overview
//!
//! The crate composes five primitives around an opaque async operation:
//!
//! - **Circuit breaking** ([`resilience`]) — per-endpoint failure isolation
//!   with automatic recovery probing
//! - **Retry** ([`resilience`]) — bounded retries with exponential backoff
//!   and jitter, driven by structured error classification
//! - **Response caching** ([`cache`]) — TTL/LRU caching with
//!   order-independent keys and single-flight miss de-duplication
//! - **Connection pooling** ([`pool`]) — bounded reusable client handles per
//!   (region, service) with background health monitoring
//! - **Parallel execution** ([`execution`]) — dependency-aware batches run
//!   in topological waves under a concurrency bound
//!
//! The [`invocation`] module wires these into the single-call pipeline:
//! cache → pool → circuit breaker → retry → operation.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use invoker_core::config::ConfigManager;
//! use invoker_core::invocation::{InvocationContext, ResilientInvoker};
//! use invoker_core::pool::{ConnectionFactory, PoolKey};
//! use async_trait::async_trait;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! struct AgentClientFactory;
//!
//! #[async_trait]
//! impl ConnectionFactory for AgentClientFactory {
//!     type Client = Arc<String>; // stand-in for an SDK client
//!
//!     async fn connect(&self, key: &PoolKey) -> anyhow::Result<Self::Client> {
//!         Ok(Arc::new(format!("client for {key}")))
//!     }
//!
//!     async fn health_check(&self, _key: &PoolKey, _client: &Self::Client) -> anyhow::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let invoker = Arc::new(ResilientInvoker::from_config(
//!     manager.config(),
//!     Arc::new(AgentClientFactory),
//! ));
//! let background = invoker.start_background_tasks();
//!
//! let ctx = InvocationContext::new(
//!     "get_menu",
//!     "arn:agent:runtime/support",
//!     "agent-runtime",
//!     "us-east-1",
//! )
//! .with_parameters(json!({"restaurant_id": 42}))
//! .cached();
//!
//! let _response = invoker
//!     .invoke(&ctx, |_client| async { Ok(json!({"items": []})) })
//!     .await?;
//!
//! background.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency Model
//!
//! Fully asynchronous and cooperative on tokio. Internal locks guard only
//! short synchronous state mutations and are never held across await
//! points; fan-out is bounded by explicit semaphores; background jobs
//! (cache sweep, pool health) are long-lived tasks stopped via cancellation
//! signals with bounded joins.

pub mod cache;
pub mod config;
pub mod error;
pub mod execution;
pub mod invocation;
pub mod logging;
pub mod pool;
pub mod resilience;
pub mod utils;

pub use cache::{CacheConfig, ResponseCache};
pub use config::{ConfigManager, InvokerConfig};
pub use error::{ErrorKind, InvokerError, Result};
pub use execution::{
    ExecutionStrategy, ParallelExecutionConfig, ParallelExecutionResult, ParallelExecutionService,
    TaskDefinition, TaskResult, TaskStatus,
};
pub use invocation::{InvocationContext, ResilientInvoker};
pub use pool::{ConnectionFactory, ConnectionPoolManager, PoolConfig, PoolKey};
pub use resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState, RetryConfig,
    RetryHandler,
};
