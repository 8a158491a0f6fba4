//! # Parallel Execution Service
//!
//! Executes a batch of possibly-interdependent async tasks: validates the
//! dependency graph, decomposes it into topological waves, dispatches each
//! wave concurrently under a bounded semaphore, and aggregates per-task
//! results under a configurable success policy.
//!
//! A task whose dependency failed is marked failed without running and
//! without consuming its retry budget. FAIL_FAST stops scheduling further
//! waves but never aborts tasks already in flight in the current wave.

use crate::error::{InvokerError, Result};
use crate::execution::graph;
use crate::execution::types::{
    ExecutionStrategy, ParallelExecutionConfig, ParallelExecutionResult, TaskDefinition,
    TaskResult, TaskStatus,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Batch executor over a fixed [`ParallelExecutionConfig`].
#[derive(Debug, Clone)]
pub struct ParallelExecutionService {
    config: ParallelExecutionConfig,
}

impl ParallelExecutionService {
    pub fn new(config: ParallelExecutionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ParallelExecutionConfig {
        &self.config
    }

    /// Execute a batch with the service's configuration.
    pub async fn execute_parallel(
        &self,
        tasks: Vec<TaskDefinition>,
    ) -> Result<ParallelExecutionResult> {
        self.execute_parallel_with(tasks, self.config.clone()).await
    }

    /// Execute a batch with an explicit per-batch configuration.
    ///
    /// Validation failures (cycles, unknown dependencies, duplicate ids)
    /// abort before any task runs.
    pub async fn execute_parallel_with(
        &self,
        tasks: Vec<TaskDefinition>,
        config: ParallelExecutionConfig,
    ) -> Result<ParallelExecutionResult> {
        graph::validate(&tasks)?;

        let execution_id = Uuid::new_v4();
        let started_at = Utc::now();
        let total_tasks = tasks.len();
        let waves = graph::execution_waves(&tasks);

        info!(
            execution_id = %execution_id,
            strategy = %config.strategy,
            total_tasks,
            waves = waves.len(),
            max_concurrent = config.max_concurrent_tasks,
            "⚡ Parallel execution started"
        );

        let mut task_map: HashMap<String, TaskDefinition> = tasks
            .into_iter()
            .map(|task| (task.task_id.clone(), task))
            .collect();
        let mut results: HashMap<String, TaskResult> = task_map
            .keys()
            .map(|id| (id.clone(), TaskResult::pending(id.clone())))
            .collect();

        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_tasks.max(1)));
        let mut halted = false;

        for (wave_index, wave) in waves.iter().enumerate() {
            if halted {
                for task_id in wave {
                    if let Some(result) = results.get_mut(task_id) {
                        result.status = TaskStatus::Cancelled;
                        result.error = Some(InvokerError::Cancelled {
                            task_id: task_id.clone(),
                        });
                    }
                }
                continue;
            }

            let mut runnable = Vec::new();
            for task_id in wave {
                let Some(task) = task_map.remove(task_id) else {
                    continue;
                };
                let failed_dependency = task.dependencies.iter().find(|dependency| {
                    !results
                        .get(dependency.as_str())
                        .map(TaskResult::is_success)
                        .unwrap_or(false)
                });
                match failed_dependency {
                    Some(dependency) => {
                        let now = Utc::now();
                        warn!(
                            execution_id = %execution_id,
                            task_id = %task.task_id,
                            dependency = %dependency,
                            "Task skipped, dependency not satisfied"
                        );
                        results.insert(
                            task.task_id.clone(),
                            TaskResult {
                                task_id: task.task_id.clone(),
                                status: TaskStatus::Failed,
                                result: None,
                                error: Some(InvokerError::DependencyUnsatisfied {
                                    task_id: task.task_id.clone(),
                                    dependency: dependency.clone(),
                                }),
                                started_at: Some(now),
                                completed_at: Some(now),
                                attempts: 0,
                            },
                        );
                    }
                    None => runnable.push(task),
                }
            }

            debug!(
                execution_id = %execution_id,
                wave = wave_index,
                dispatching = runnable.len(),
                "Dispatching wave"
            );

            let wave_futures = runnable.into_iter().map(|task| {
                let semaphore = Arc::clone(&semaphore);
                let config = config.clone();
                async move { run_task(task, &config, semaphore).await }
            });
            for result in futures::future::join_all(wave_futures).await {
                results.insert(result.task_id.clone(), result);
            }

            let wave_failed = wave
                .iter()
                .any(|task_id| !results.get(task_id).map(TaskResult::is_success).unwrap_or(false));

            if wave_failed && config.strategy == ExecutionStrategy::FailFast {
                warn!(
                    execution_id = %execution_id,
                    wave = wave_index,
                    "Fail-fast halting remaining waves"
                );
                halted = true;
            }
        }

        let successful_tasks = count_status(&results, TaskStatus::Completed);
        let failed_tasks = count_status(&results, TaskStatus::Failed);
        let cancelled_tasks = count_status(&results, TaskStatus::Cancelled);
        let timed_out_tasks = count_status(&results, TaskStatus::Timeout);

        let overall_success = match config.strategy {
            ExecutionStrategy::AllOrNothing | ExecutionStrategy::FailFast => {
                successful_tasks == total_tasks
            }
            ExecutionStrategy::BestEffort => successful_tasks > 0,
            ExecutionStrategy::MajoritySuccess => successful_tasks * 2 > total_tasks,
        };

        let completed_at = Utc::now();
        info!(
            execution_id = %execution_id,
            successful = successful_tasks,
            failed = failed_tasks,
            cancelled = cancelled_tasks,
            timed_out = timed_out_tasks,
            overall_success,
            "⚡ Parallel execution finished"
        );

        Ok(ParallelExecutionResult {
            execution_id,
            strategy: config.strategy,
            total_tasks,
            successful_tasks,
            failed_tasks,
            cancelled_tasks,
            timed_out_tasks,
            task_results: results,
            started_at,
            completed_at,
            overall_success,
        })
    }
}

fn count_status(results: &HashMap<String, TaskResult>, status: TaskStatus) -> usize {
    results.values().filter(|r| r.status == status).count()
}

/// Run one task under the concurrency semaphore with timeout and fixed-delay
/// retries.
async fn run_task(
    task: TaskDefinition,
    config: &ParallelExecutionConfig,
    semaphore: Arc<Semaphore>,
) -> TaskResult {
    let Ok(_permit) = semaphore.acquire_owned().await else {
        // The semaphore lives as long as the batch; closure is unreachable
        // in practice but must not panic the batch.
        return TaskResult {
            task_id: task.task_id.clone(),
            status: TaskStatus::Cancelled,
            result: None,
            error: Some(InvokerError::Cancelled {
                task_id: task.task_id.clone(),
            }),
            started_at: None,
            completed_at: None,
            attempts: 0,
        };
    };

    let started_at = Utc::now();
    let timeout = task.timeout.unwrap_or(config.default_timeout);
    let retry_budget = task.retry_count.min(config.max_retries_per_task);

    let mut attempts = 0;
    let mut timed_out = false;
    let mut last_error = None;

    for attempt in 0..=retry_budget {
        if attempt > 0 {
            tokio::time::sleep(config.retry_delay).await;
        }
        attempts += 1;

        match tokio::time::timeout(timeout, (task.operation)()).await {
            Ok(Ok(value)) => {
                debug!(task_id = %task.task_id, attempts, "Task completed");
                return TaskResult {
                    task_id: task.task_id,
                    status: TaskStatus::Completed,
                    result: Some(value),
                    error: None,
                    started_at: Some(started_at),
                    completed_at: Some(Utc::now()),
                    attempts,
                };
            }
            Ok(Err(err)) => {
                warn!(
                    task_id = %task.task_id,
                    attempt,
                    remaining = retry_budget - attempt,
                    error = %err,
                    "Task attempt failed"
                );
                timed_out = false;
                last_error = Some(err);
            }
            Err(_) => {
                warn!(
                    task_id = %task.task_id,
                    attempt,
                    timeout_secs = timeout.as_secs_f64(),
                    "Task attempt timed out"
                );
                timed_out = true;
                last_error = Some(InvokerError::Timeout {
                    operation: task.task_id.clone(),
                    timeout,
                });
            }
        }
    }

    TaskResult {
        task_id: task.task_id,
        status: if timed_out {
            TaskStatus::Timeout
        } else {
            TaskStatus::Failed
        },
        result: None,
        error: last_error,
        started_at: Some(started_at),
        completed_at: Some(Utc::now()),
        attempts,
    }
}
