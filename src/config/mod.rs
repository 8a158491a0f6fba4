//! # Configuration System
//!
//! File- and environment-backed configuration for every component of the
//! invocation core. Settings structs here are the serde-facing shapes
//! (numeric seconds fields, string enum names) loaded by [`ConfigManager`];
//! each converts into the runtime config type its component consumes after
//! explicit validation. No silent fallbacks: bad values fail loading.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use invoker_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load configuration (environment auto-detected)
//! let manager = ConfigManager::load()?;
//!
//! let breaker_config = manager.config().circuit_breaker_config();
//! let cache_config = manager.config().cache_config();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::cache::CacheConfig;
use crate::error::ErrorKind;
use crate::execution::{ExecutionStrategy, ParallelExecutionConfig};
use crate::pool::PoolConfig;
use crate::resilience::config::{CircuitBreakerConfig, RetryConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration for the invocation core.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct InvokerConfig {
    pub circuit_breaker: CircuitBreakerSettings,
    pub retry: RetrySettings,
    pub cache: CacheSettings,
    pub pool: PoolSettings,
    pub execution: ExecutionSettings,
}

impl InvokerConfig {
    /// Reject values that would misconfigure a component.
    pub fn validate(&self) -> ConfigResult<()> {
        self.circuit_breaker.validate()?;
        self.retry.validate()?;
        self.cache.validate()?;
        self.pool.validate()?;
        self.execution.validate()?;
        Ok(())
    }

    pub fn circuit_breaker_config(&self) -> CircuitBreakerConfig {
        self.circuit_breaker.to_config()
    }

    pub fn retry_config(&self) -> RetryConfig {
        self.retry.to_config()
    }

    pub fn cache_config(&self) -> CacheConfig {
        self.cache.to_config()
    }

    pub fn pool_config(&self) -> PoolConfig {
        self.pool.to_config()
    }

    pub fn execution_config(&self) -> ParallelExecutionConfig {
        self.execution.to_config()
    }
}

/// Circuit breaker thresholds, file-facing shape.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: u32,
    pub recovery_timeout_seconds: f64,
    pub half_open_max_calls: u32,
    pub success_threshold: u32,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        let config = CircuitBreakerConfig::default();
        Self {
            failure_threshold: config.failure_threshold,
            recovery_timeout_seconds: config.recovery_timeout.as_secs_f64(),
            half_open_max_calls: config.half_open_max_calls,
            success_threshold: config.success_threshold,
        }
    }
}

impl CircuitBreakerSettings {
    fn validate(&self) -> ConfigResult<()> {
        if self.failure_threshold == 0 {
            return Err(ConfigurationError::validation(
                "circuit_breaker.failure_threshold must be at least 1",
            ));
        }
        if self.success_threshold == 0 {
            return Err(ConfigurationError::validation(
                "circuit_breaker.success_threshold must be at least 1",
            ));
        }
        if self.half_open_max_calls == 0 {
            return Err(ConfigurationError::validation(
                "circuit_breaker.half_open_max_calls must be at least 1",
            ));
        }
        if self.recovery_timeout_seconds <= 0.0 {
            return Err(ConfigurationError::validation(
                "circuit_breaker.recovery_timeout_seconds must be positive",
            ));
        }
        Ok(())
    }

    pub fn to_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            recovery_timeout: Duration::from_secs_f64(self.recovery_timeout_seconds.max(0.0)),
            half_open_max_calls: self.half_open_max_calls,
            success_threshold: self.success_threshold,
        }
    }
}

/// Retry/backoff behavior, file-facing shape.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_seconds: f64,
    pub max_delay_seconds: f64,
    pub exponential_base: f64,
    pub jitter: bool,
    /// Error kind names treated as retryable (see [`ErrorKind`])
    pub retryable_errors: Vec<String>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let config = RetryConfig::default();
        let mut retryable_errors: Vec<String> = config
            .retryable_kinds
            .iter()
            .map(|kind| kind.to_string())
            .collect();
        retryable_errors.sort();
        Self {
            max_retries: config.max_retries,
            base_delay_seconds: config.base_delay.as_secs_f64(),
            max_delay_seconds: config.max_delay.as_secs_f64(),
            exponential_base: config.exponential_base,
            jitter: config.jitter,
            retryable_errors,
        }
    }
}

impl RetrySettings {
    fn validate(&self) -> ConfigResult<()> {
        if self.base_delay_seconds <= 0.0 {
            return Err(ConfigurationError::validation(
                "retry.base_delay_seconds must be positive",
            ));
        }
        if self.max_delay_seconds < self.base_delay_seconds {
            return Err(ConfigurationError::validation(
                "retry.max_delay_seconds must be at least retry.base_delay_seconds",
            ));
        }
        if self.exponential_base < 1.0 {
            return Err(ConfigurationError::validation(
                "retry.exponential_base must be at least 1.0",
            ));
        }
        for name in &self.retryable_errors {
            name.parse::<ErrorKind>().map_err(|err| {
                ConfigurationError::validation(format!("retry.retryable_errors: {err}"))
            })?;
        }
        Ok(())
    }

    pub fn to_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            base_delay: Duration::from_secs_f64(self.base_delay_seconds.max(0.0)),
            max_delay: Duration::from_secs_f64(self.max_delay_seconds.max(0.0)),
            exponential_base: self.exponential_base,
            jitter: self.jitter,
            retryable_kinds: self
                .retryable_errors
                .iter()
                .filter_map(|name| name.parse().ok())
                .collect(),
        }
    }
}

/// Response cache sizing and TTLs, file-facing shape.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    pub default_ttl_seconds: f64,
    pub max_cache_size: usize,
    pub max_entries_per_operation: usize,
    pub cleanup_interval_seconds: f64,
    /// Per-operation TTL overrides, seconds
    pub operation_ttl_seconds: HashMap<String, f64>,
    /// Per-operation size cap overrides
    pub operation_max_entries: HashMap<String, usize>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        let config = CacheConfig::default();
        Self {
            default_ttl_seconds: config.default_ttl.as_secs_f64(),
            max_cache_size: config.max_cache_size,
            max_entries_per_operation: config.max_entries_per_operation,
            cleanup_interval_seconds: config.cleanup_interval.as_secs_f64(),
            operation_ttl_seconds: HashMap::new(),
            operation_max_entries: HashMap::new(),
        }
    }
}

impl CacheSettings {
    fn validate(&self) -> ConfigResult<()> {
        if self.max_cache_size == 0 {
            return Err(ConfigurationError::validation(
                "cache.max_cache_size must be at least 1",
            ));
        }
        if self.max_entries_per_operation == 0 {
            return Err(ConfigurationError::validation(
                "cache.max_entries_per_operation must be at least 1",
            ));
        }
        if self.default_ttl_seconds <= 0.0 {
            return Err(ConfigurationError::validation(
                "cache.default_ttl_seconds must be positive",
            ));
        }
        if self.cleanup_interval_seconds <= 0.0 {
            return Err(ConfigurationError::validation(
                "cache.cleanup_interval_seconds must be positive",
            ));
        }
        Ok(())
    }

    pub fn to_config(&self) -> CacheConfig {
        CacheConfig {
            default_ttl: Duration::from_secs_f64(self.default_ttl_seconds.max(0.0)),
            max_cache_size: self.max_cache_size,
            max_entries_per_operation: self.max_entries_per_operation,
            cleanup_interval: Duration::from_secs_f64(self.cleanup_interval_seconds.max(0.0)),
            operation_ttls: self
                .operation_ttl_seconds
                .iter()
                .map(|(op, secs)| (op.clone(), Duration::from_secs_f64(secs.max(0.0))))
                .collect(),
            operation_max_entries: self.operation_max_entries.clone(),
        }
    }
}

/// Connection pool sizing and health thresholds, file-facing shape.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolSettings {
    pub max_connections_per_pool: usize,
    pub min_connections_per_pool: usize,
    pub max_idle_time_seconds: f64,
    pub max_connection_age_seconds: f64,
    pub health_check_interval_seconds: f64,
    pub min_success_rate: f64,
    pub success_rate_min_requests: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        let config = PoolConfig::default();
        Self {
            max_connections_per_pool: config.max_connections_per_pool,
            min_connections_per_pool: config.min_connections_per_pool,
            max_idle_time_seconds: config.max_idle_time.as_secs_f64(),
            max_connection_age_seconds: config.max_connection_age.as_secs_f64(),
            health_check_interval_seconds: config.health_check_interval.as_secs_f64(),
            min_success_rate: config.min_success_rate,
            success_rate_min_requests: config.success_rate_min_requests,
        }
    }
}

impl PoolSettings {
    fn validate(&self) -> ConfigResult<()> {
        if self.max_connections_per_pool == 0 {
            return Err(ConfigurationError::validation(
                "pool.max_connections_per_pool must be at least 1",
            ));
        }
        if self.min_connections_per_pool > self.max_connections_per_pool {
            return Err(ConfigurationError::validation(
                "pool.min_connections_per_pool cannot exceed pool.max_connections_per_pool",
            ));
        }
        if !(0.0..=1.0).contains(&self.min_success_rate) {
            return Err(ConfigurationError::validation(
                "pool.min_success_rate must be between 0.0 and 1.0",
            ));
        }
        if self.health_check_interval_seconds <= 0.0 {
            return Err(ConfigurationError::validation(
                "pool.health_check_interval_seconds must be positive",
            ));
        }
        Ok(())
    }

    pub fn to_config(&self) -> PoolConfig {
        PoolConfig {
            max_connections_per_pool: self.max_connections_per_pool,
            min_connections_per_pool: self.min_connections_per_pool,
            max_idle_time: Duration::from_secs_f64(self.max_idle_time_seconds.max(0.0)),
            max_connection_age: Duration::from_secs_f64(self.max_connection_age_seconds.max(0.0)),
            health_check_interval: Duration::from_secs_f64(
                self.health_check_interval_seconds.max(0.0),
            ),
            min_success_rate: self.min_success_rate,
            success_rate_min_requests: self.success_rate_min_requests,
        }
    }
}

/// Parallel execution behavior, file-facing shape.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutionSettings {
    /// One of: all_or_nothing, best_effort, fail_fast, majority_success
    pub strategy: String,
    pub max_concurrent_tasks: usize,
    pub default_timeout_seconds: f64,
    pub max_retries_per_task: u32,
    pub retry_delay_seconds: f64,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        let config = ParallelExecutionConfig::default();
        Self {
            strategy: config.strategy.to_string(),
            max_concurrent_tasks: config.max_concurrent_tasks,
            default_timeout_seconds: config.default_timeout.as_secs_f64(),
            max_retries_per_task: config.max_retries_per_task,
            retry_delay_seconds: config.retry_delay.as_secs_f64(),
        }
    }
}

impl ExecutionSettings {
    fn validate(&self) -> ConfigResult<()> {
        self.strategy.parse::<ExecutionStrategy>().map_err(|err| {
            ConfigurationError::validation(format!("execution.strategy: {err}"))
        })?;
        if self.max_concurrent_tasks == 0 {
            return Err(ConfigurationError::validation(
                "execution.max_concurrent_tasks must be at least 1",
            ));
        }
        if self.default_timeout_seconds <= 0.0 {
            return Err(ConfigurationError::validation(
                "execution.default_timeout_seconds must be positive",
            ));
        }
        Ok(())
    }

    pub fn to_config(&self) -> ParallelExecutionConfig {
        ParallelExecutionConfig {
            strategy: self
                .strategy
                .parse()
                .unwrap_or(ExecutionStrategy::BestEffort),
            max_concurrent_tasks: self.max_concurrent_tasks,
            default_timeout: Duration::from_secs_f64(self.default_timeout_seconds.max(0.0)),
            max_retries_per_task: self.max_retries_per_task,
            retry_delay: Duration::from_secs_f64(self.retry_delay_seconds.max(0.0)),
        }
    }
}
