//! # Parallel Execution Types
//!
//! Task definitions consumed by the parallel execution service and the
//! per-task / per-batch results it aggregates. Definitions are ephemeral:
//! constructed per batch and not retained after the batch completes.

use crate::error::{InvokerError, Result};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// The opaque async call a task performs.
///
/// Boxed so a batch can mix operations over different captures; `Fn` (not
/// `FnOnce`) because the executor re-invokes it on retry.
pub type TaskOperation = Arc<dyn Fn() -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// One task in a batch.
#[derive(Clone)]
pub struct TaskDefinition {
    /// Unique id within the batch
    pub task_id: String,

    /// The operation to perform
    pub operation: TaskOperation,

    /// Task ids that must complete successfully before this task runs
    pub dependencies: Vec<String>,

    /// Per-task timeout; the batch default applies when `None`
    pub timeout: Option<Duration>,

    /// Additional attempts after the first failure
    pub retry_count: u32,

    /// Free-form metadata carried through to the result
    pub metadata: HashMap<String, Value>,
}

impl TaskDefinition {
    pub fn new<F, Fut>(task_id: impl Into<String>, operation: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            task_id: task_id.into(),
            operation: Arc::new(move || {
                let fut: BoxFuture<'static, Result<Value>> = Box::pin(operation());
                fut
            }),
            dependencies: Vec::new(),
            timeout: None,
            retry_count: 0,
            metadata: HashMap::new(),
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

impl std::fmt::Debug for TaskDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskDefinition")
            .field("task_id", &self.task_id)
            .field("dependencies", &self.dependencies)
            .field("timeout", &self.timeout)
            .field("retry_count", &self.retry_count)
            .finish_non_exhaustive()
    }
}

/// Lifecycle status of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Timeout,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Timeout => "timeout",
        };
        write!(f, "{label}")
    }
}

/// Outcome of one task.
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub task_id: String,
    pub status: TaskStatus,
    pub result: Option<Value>,
    pub error: Option<InvokerError>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Attempts actually made (0 when the task never ran)
    pub attempts: u32,
}

impl TaskResult {
    pub fn pending(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Pending,
            result: None,
            error: None,
            started_at: None,
            completed_at: None,
            attempts: 0,
        }
    }

    /// Wall-clock execution time, when the task both started and finished.
    pub fn execution_time(&self) -> Option<Duration> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => (end - start).to_std().ok(),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

/// Batch success policy, evaluated after each wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    /// Successful only if every task succeeded
    AllOrNothing,
    /// Keep going regardless of failures; successful if anything succeeded
    BestEffort,
    /// Stop scheduling new waves on the first failure
    FailFast,
    /// Successful if more than half of all tasks succeeded
    MajoritySuccess,
}

impl std::fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ExecutionStrategy::AllOrNothing => "all_or_nothing",
            ExecutionStrategy::BestEffort => "best_effort",
            ExecutionStrategy::FailFast => "fail_fast",
            ExecutionStrategy::MajoritySuccess => "majority_success",
        };
        write!(f, "{label}")
    }
}

impl std::str::FromStr for ExecutionStrategy {
    type Err = InvokerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all_or_nothing" => Ok(ExecutionStrategy::AllOrNothing),
            "best_effort" => Ok(ExecutionStrategy::BestEffort),
            "fail_fast" => Ok(ExecutionStrategy::FailFast),
            "majority_success" => Ok(ExecutionStrategy::MajoritySuccess),
            other => Err(InvokerError::Configuration(format!(
                "unknown execution strategy '{other}'"
            ))),
        }
    }
}

/// Batch-level execution configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ParallelExecutionConfig {
    pub strategy: ExecutionStrategy,

    /// Concurrency bound across tasks within a wave
    pub max_concurrent_tasks: usize,

    /// Timeout applied to tasks that declare none
    pub default_timeout: Duration,

    /// Cap on per-task retry counts
    pub max_retries_per_task: u32,

    /// Fixed delay between per-task retry attempts
    pub retry_delay: Duration,
}

impl Default for ParallelExecutionConfig {
    fn default() -> Self {
        Self {
            strategy: ExecutionStrategy::BestEffort,
            max_concurrent_tasks: 8,
            default_timeout: Duration::from_secs(300),
            max_retries_per_task: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Aggregated outcome of one batch.
#[derive(Debug, Clone)]
pub struct ParallelExecutionResult {
    pub execution_id: Uuid,
    pub strategy: ExecutionStrategy,
    pub total_tasks: usize,
    pub successful_tasks: usize,
    pub failed_tasks: usize,
    pub cancelled_tasks: usize,
    pub timed_out_tasks: usize,
    pub task_results: HashMap<String, TaskResult>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: chrono::DateTime<chrono::Utc>,
    pub overall_success: bool,
}

impl ParallelExecutionResult {
    /// Values of every completed task, keyed by task id.
    pub fn get_successful_results(&self) -> HashMap<String, Value> {
        self.task_results
            .iter()
            .filter(|(_, result)| result.is_success())
            .filter_map(|(id, result)| result.result.clone().map(|value| (id.clone(), value)))
            .collect()
    }

    /// Errors of every failed or timed-out task, keyed by task id.
    pub fn get_failed_results(&self) -> HashMap<String, InvokerError> {
        self.task_results
            .iter()
            .filter(|(_, result)| {
                matches!(result.status, TaskStatus::Failed | TaskStatus::Timeout)
            })
            .filter_map(|(id, result)| result.error.clone().map(|err| (id.clone(), err)))
            .collect()
    }

    /// Total wall-clock duration of the batch.
    pub fn total_execution_time(&self) -> Duration {
        (self.completed_at - self.started_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}
