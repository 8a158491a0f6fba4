//! # Structured Error Handling
//!
//! Central error taxonomy for the invocation core. Every error carries an
//! [`ErrorKind`] tag attached at the point of origin so the retry and circuit
//! breaker layers can make admission/retry decisions without string matching.
//! String/heuristic matching survives only as a last-resort fallback inside
//! the error classifier for foreign errors.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Error kind tags consulted by the retry/circuit-breaker layers.
///
/// Kinds are stable identifiers, not concrete types: collaborators that wrap
/// their own failures into [`InvokerError`] pick the kind that best matches
/// the failure mode at the point of origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Circuit breaker rejected the call without attempting it
    CircuitOpen,
    /// Operation exceeded its deadline
    Timeout,
    /// Connection/transport level failure
    Unavailable,
    /// Remote call executed and returned a failure response
    InvocationFailed,
    /// Downstream is shedding load
    Throttled,
    /// No connection available in the pool
    PoolExhausted,
    /// A prerequisite task did not complete successfully
    DependencyUnsatisfied,
    /// Dependency graph validation failure
    CycleDetected,
    /// Dependency references a task id not present in the batch
    UnknownDependency,
    /// Task was cancelled before it started
    Cancelled,
    /// Invalid configuration
    Configuration,
    /// Anything that escaped classification
    Unknown,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorKind::CircuitOpen => "circuit_open",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::InvocationFailed => "invocation_failed",
            ErrorKind::Throttled => "throttled",
            ErrorKind::PoolExhausted => "pool_exhausted",
            ErrorKind::DependencyUnsatisfied => "dependency_unsatisfied",
            ErrorKind::CycleDetected => "cycle_detected",
            ErrorKind::UnknownDependency => "unknown_dependency",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Unknown => "unknown",
        };
        write!(f, "{label}")
    }
}

impl std::str::FromStr for ErrorKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "circuit_open" => Ok(ErrorKind::CircuitOpen),
            "timeout" => Ok(ErrorKind::Timeout),
            "unavailable" => Ok(ErrorKind::Unavailable),
            "invocation_failed" => Ok(ErrorKind::InvocationFailed),
            "throttled" => Ok(ErrorKind::Throttled),
            "pool_exhausted" => Ok(ErrorKind::PoolExhausted),
            "dependency_unsatisfied" => Ok(ErrorKind::DependencyUnsatisfied),
            "cycle_detected" => Ok(ErrorKind::CycleDetected),
            "unknown_dependency" => Ok(ErrorKind::UnknownDependency),
            "cancelled" => Ok(ErrorKind::Cancelled),
            "configuration" => Ok(ErrorKind::Configuration),
            "unknown" => Ok(ErrorKind::Unknown),
            other => Err(format!("unknown error kind '{other}'")),
        }
    }
}

/// Errors raised by the invocation core.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InvokerError {
    /// Admission denied by the circuit breaker. `retry_after` is the
    /// remaining time until the breaker will admit a recovery probe,
    /// floored at zero.
    #[error("circuit breaker is open for {endpoint} (retry after {retry_after:?})")]
    CircuitOpen {
        endpoint: String,
        retry_after: Duration,
    },

    /// Operation exceeded its deadline.
    #[error("operation '{operation}' timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    /// Connection or transport level failure before a response was produced.
    #[error("service unavailable: {message}")]
    Unavailable { message: String },

    /// The remote call executed and reported failure.
    #[error("invocation failed: {message}")]
    InvocationFailed {
        message: String,
        /// Status code reported by the remote side, when one exists
        status_code: Option<u16>,
        /// Set by the origin when the failure is known to be transient
        retryable: bool,
        /// Set when the remote side signalled load shedding
        throttled: bool,
    },

    /// The pool is at capacity with no idle connection.
    #[error("connection pool exhausted for {pool_key} ({max_connections} connections)")]
    PoolExhausted {
        pool_key: String,
        max_connections: usize,
    },

    /// A declared dependency of this task did not complete successfully.
    #[error("task '{task_id}' dependency not satisfied: '{dependency}'")]
    DependencyUnsatisfied { task_id: String, dependency: String },

    /// The batch dependency graph contains a cycle.
    #[error("cyclic dependency detected involving task '{task_id}'")]
    CycleDetected { task_id: String },

    /// A dependency references a task id not present in the batch.
    #[error("task '{task_id}' depends on unknown task '{dependency}'")]
    UnknownDependency { task_id: String, dependency: String },

    /// The task was cancelled before execution started.
    #[error("task '{task_id}' cancelled before execution")]
    Cancelled { task_id: String },

    /// Invalid or unloadable configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl InvokerError {
    /// The structured kind tag for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            InvokerError::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            InvokerError::Timeout { .. } => ErrorKind::Timeout,
            InvokerError::Unavailable { .. } => ErrorKind::Unavailable,
            InvokerError::InvocationFailed { throttled: true, .. } => ErrorKind::Throttled,
            InvokerError::InvocationFailed { .. } => ErrorKind::InvocationFailed,
            InvokerError::PoolExhausted { .. } => ErrorKind::PoolExhausted,
            InvokerError::DependencyUnsatisfied { .. } => ErrorKind::DependencyUnsatisfied,
            InvokerError::CycleDetected { .. } => ErrorKind::CycleDetected,
            InvokerError::UnknownDependency { .. } => ErrorKind::UnknownDependency,
            InvokerError::Cancelled { .. } => ErrorKind::Cancelled,
            InvokerError::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// Whether the origin declared this error transient.
    ///
    /// This is the structured self-declaration consulted first by the
    /// classifier. `CircuitOpen` and `PoolExhausted` are hard-wired
    /// non-retryable: the breaker/pool already decided no capacity exists.
    /// `Timeout`/`Unavailable` return `None` and defer to the configured
    /// retryable-kind set.
    pub fn declares_retryable(&self) -> Option<bool> {
        match self {
            InvokerError::CircuitOpen { .. } | InvokerError::PoolExhausted { .. } => Some(false),
            InvokerError::Cancelled { .. }
            | InvokerError::CycleDetected { .. }
            | InvokerError::UnknownDependency { .. }
            | InvokerError::DependencyUnsatisfied { .. }
            | InvokerError::Configuration(_) => Some(false),
            InvokerError::InvocationFailed {
                retryable,
                throttled,
                status_code,
                ..
            } => {
                if *retryable || *throttled {
                    Some(true)
                } else {
                    // Server-side failures are worth another attempt;
                    // 4xx-style failures never are.
                    status_code.map(|code| code >= 500)
                }
            }
            InvokerError::Timeout { .. } | InvokerError::Unavailable { .. } => None,
        }
    }

    /// Wrap a transport failure from a collaborator error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        InvokerError::Unavailable {
            message: message.into(),
        }
    }

    /// Wrap a remote failure response.
    pub fn invocation_failed(message: impl Into<String>, status_code: Option<u16>) -> Self {
        InvokerError::InvocationFailed {
            message: message.into(),
            status_code,
            retryable: false,
            throttled: false,
        }
    }
}

impl From<anyhow::Error> for InvokerError {
    /// Collaborator seams (connection factories, injected operations) report
    /// failures as `anyhow::Error`; absent better information they are
    /// transport-level failures.
    fn from(err: anyhow::Error) -> Self {
        InvokerError::Unavailable {
            message: format!("{err:#}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, InvokerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circuit_open_is_never_retryable() {
        let err = InvokerError::CircuitOpen {
            endpoint: "agent-a".to_string(),
            retry_after: Duration::from_secs(10),
        };
        assert_eq!(err.kind(), ErrorKind::CircuitOpen);
        assert_eq!(err.declares_retryable(), Some(false));
    }

    #[test]
    fn invocation_failure_retryable_on_server_errors() {
        let err = InvokerError::invocation_failed("internal error", Some(503));
        assert_eq!(err.declares_retryable(), Some(true));

        let err = InvokerError::invocation_failed("bad request", Some(400));
        assert_eq!(err.declares_retryable(), Some(false));
    }

    #[test]
    fn throttled_invocation_reports_throttled_kind() {
        let err = InvokerError::InvocationFailed {
            message: "slow down".to_string(),
            status_code: Some(429),
            retryable: false,
            throttled: true,
        };
        assert_eq!(err.kind(), ErrorKind::Throttled);
        assert_eq!(err.declares_retryable(), Some(true));
    }

    #[test]
    fn timeout_defers_to_classifier() {
        let err = InvokerError::Timeout {
            operation: "invoke_agent".to_string(),
            timeout: Duration::from_secs(30),
        };
        assert_eq!(err.declares_retryable(), None);
    }
}
