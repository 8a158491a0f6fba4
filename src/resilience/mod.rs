//! # Resilience Module
//!
//! Failure isolation and bounded retry for remote invocations.
//!
//! ## Architecture
//!
//! - **Circuit Breakers**: per-endpoint admission control to isolate failing
//!   endpoints and probe for recovery
//! - **Registry**: lazy per-endpoint breaker creation with aggregate metrics
//! - **Retry**: exponential backoff with jitter for transient failures
//! - **Classification**: structured error-kind tags decide retryability, with
//!   a message-substring fallback for foreign errors
//!
//! ## Usage
//!
//! ```rust,no_run
//! use invoker_core::resilience::{CircuitBreaker, CircuitBreakerConfig};
//! use invoker_core::error::InvokerError;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), InvokerError> {
//! let config = CircuitBreakerConfig {
//!     failure_threshold: 5,
//!     recovery_timeout: Duration::from_secs(30),
//!     half_open_max_calls: 3,
//!     success_threshold: 2,
//! };
//!
//! let breaker = CircuitBreaker::new("arn:agent:runtime/support", config);
//!
//! let _result = breaker.call(|| async {
//!     // Remote invocation here
//!     Ok::<&str, InvokerError>("success")
//! }).await?;
//! # Ok(())
//! # }
//! ```

pub mod circuit_breaker;
pub mod classifier;
pub mod config;
pub mod metrics;
pub mod registry;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use classifier::{ErrorClassifier, ErrorDisposition, StandardErrorClassifier};
pub use config::{default_retryable_kinds, CircuitBreakerConfig, RetryConfig};
pub use metrics::{CircuitBreakerStats, SystemResilienceStats};
pub use registry::CircuitBreakerRegistry;
pub use retry::{backoff_delay, RetryHandler};
