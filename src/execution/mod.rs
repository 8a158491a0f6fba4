//! # Parallel Execution Module
//!
//! Dependency-aware batch execution of async tasks with bounded concurrency,
//! per-task timeout/retry and a configurable batch success policy.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use invoker_core::execution::{
//!     ExecutionStrategy, ParallelExecutionConfig, ParallelExecutionService, TaskDefinition,
//! };
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), invoker_core::error::InvokerError> {
//! let service = ParallelExecutionService::new(ParallelExecutionConfig {
//!     strategy: ExecutionStrategy::FailFast,
//!     ..ParallelExecutionConfig::default()
//! });
//!
//! let tasks = vec![
//!     TaskDefinition::new("fetch_menu", || async { Ok(json!({"items": 12})) }),
//!     TaskDefinition::new("fetch_hours", || async { Ok(json!({"open": "09:00"})) }),
//!     TaskDefinition::new("summarize", || async { Ok(json!("done")) })
//!         .with_dependencies(vec!["fetch_menu".into(), "fetch_hours".into()]),
//! ];
//!
//! let result = service.execute_parallel(tasks).await?;
//! println!("succeeded: {}", result.successful_tasks);
//! # Ok(())
//! # }
//! ```

pub mod graph;
pub mod parallel_executor;
pub mod types;

pub use graph::{execution_waves, validate};
pub use parallel_executor::ParallelExecutionService;
pub use types::{
    ExecutionStrategy, ParallelExecutionConfig, ParallelExecutionResult, TaskDefinition,
    TaskOperation, TaskResult, TaskStatus,
};
