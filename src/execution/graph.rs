//! # Dependency Graph Resolution
//!
//! Validates a batch's dependency graph before anything runs, and decomposes
//! it into topological waves: each wave holds the not-yet-scheduled tasks
//! whose dependencies all land in earlier waves. Tasks within a wave carry
//! no ordering constraint among themselves.

use crate::error::{InvokerError, Result};
use crate::execution::types::TaskDefinition;
use std::collections::{HashMap, HashSet};

/// Reject batches with duplicate ids, unknown dependencies or cycles.
///
/// Runs synchronously before any task executes; a validation failure aborts
/// the entire batch.
pub fn validate(tasks: &[TaskDefinition]) -> Result<()> {
    let mut ids = HashSet::with_capacity(tasks.len());
    for task in tasks {
        if !ids.insert(task.task_id.as_str()) {
            return Err(InvokerError::Configuration(format!(
                "duplicate task id '{}' in batch",
                task.task_id
            )));
        }
    }

    for task in tasks {
        for dependency in &task.dependencies {
            if !ids.contains(dependency.as_str()) {
                return Err(InvokerError::UnknownDependency {
                    task_id: task.task_id.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
    }

    detect_cycles(tasks)
}

/// DFS with an explicit recursion stack: a back edge to a task currently on
/// the stack is a cycle.
fn detect_cycles(tasks: &[TaskDefinition]) -> Result<()> {
    let deps: HashMap<&str, &[String]> = tasks
        .iter()
        .map(|task| (task.task_id.as_str(), task.dependencies.as_slice()))
        .collect();

    let mut visited: HashSet<&str> = HashSet::new();
    let mut on_stack: HashSet<&str> = HashSet::new();

    fn visit<'a>(
        node: &'a str,
        deps: &HashMap<&'a str, &'a [String]>,
        visited: &mut HashSet<&'a str>,
        on_stack: &mut HashSet<&'a str>,
    ) -> Result<()> {
        if on_stack.contains(node) {
            return Err(InvokerError::CycleDetected {
                task_id: node.to_string(),
            });
        }
        if visited.contains(node) {
            return Ok(());
        }
        on_stack.insert(node);
        if let Some(edges) = deps.get(node) {
            for dependency in edges.iter() {
                visit(dependency.as_str(), deps, visited, on_stack)?;
            }
        }
        on_stack.remove(node);
        visited.insert(node);
        Ok(())
    }

    for task in tasks {
        visit(task.task_id.as_str(), &deps, &mut visited, &mut on_stack)?;
    }
    Ok(())
}

/// Kahn-style decomposition into ordered waves of task ids.
///
/// Assumes [`validate`] passed; a validated acyclic graph always drains.
pub fn execution_waves(tasks: &[TaskDefinition]) -> Vec<Vec<String>> {
    let mut satisfied: HashSet<&str> = HashSet::new();
    let mut remaining: Vec<&TaskDefinition> = tasks.iter().collect();
    let mut waves = Vec::new();

    while !remaining.is_empty() {
        let (ready, blocked): (Vec<&TaskDefinition>, Vec<&TaskDefinition>) =
            remaining.into_iter().partition(|task| {
                task.dependencies
                    .iter()
                    .all(|dependency| satisfied.contains(dependency.as_str()))
            });

        if ready.is_empty() {
            // Unreachable after validation; bail rather than spin.
            break;
        }

        for task in &ready {
            satisfied.insert(task.task_id.as_str());
        }
        waves.push(ready.into_iter().map(|task| task.task_id.clone()).collect());
        remaining = blocked;
    }

    waves
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task(id: &str, deps: &[&str]) -> TaskDefinition {
        TaskDefinition::new(id, || async { Ok(json!(null)) })
            .with_dependencies(deps.iter().map(|d| d.to_string()).collect())
    }

    #[test]
    fn diamond_graph_resolves_into_three_waves() {
        let tasks = vec![
            task("a", &[]),
            task("b", &["a"]),
            task("c", &["a"]),
            task("d", &["b", "c"]),
        ];
        assert!(validate(&tasks).is_ok());
        let waves = execution_waves(&tasks);
        assert_eq!(waves.len(), 3);
        assert_eq!(waves[0], vec!["a".to_string()]);
        assert_eq!(
            waves[1].iter().collect::<std::collections::HashSet<_>>(),
            ["b".to_string(), "c".to_string()].iter().collect()
        );
        assert_eq!(waves[2], vec!["d".to_string()]);
    }

    #[test]
    fn independent_tasks_share_one_wave() {
        let tasks = vec![task("a", &[]), task("b", &[]), task("c", &["a", "b"])];
        let waves = execution_waves(&tasks);
        assert_eq!(waves.len(), 2);
        assert_eq!(waves[0].len(), 2);
        assert_eq!(waves[1], vec!["c".to_string()]);
    }

    #[test]
    fn direct_cycle_is_rejected() {
        let tasks = vec![task("a", &["b"]), task("b", &["a"])];
        let result = validate(&tasks);
        assert!(matches!(result, Err(InvokerError::CycleDetected { .. })));
    }

    #[test]
    fn transitive_cycle_is_rejected() {
        let tasks = vec![task("a", &["c"]), task("b", &["a"]), task("c", &["b"])];
        assert!(matches!(
            validate(&tasks),
            Err(InvokerError::CycleDetected { .. })
        ));
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let tasks = vec![task("a", &["a"])];
        assert!(matches!(
            validate(&tasks),
            Err(InvokerError::CycleDetected { .. })
        ));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let tasks = vec![task("a", &["ghost"])];
        match validate(&tasks) {
            Err(InvokerError::UnknownDependency { task_id, dependency }) => {
                assert_eq!(task_id, "a");
                assert_eq!(dependency, "ghost");
            }
            other => panic!("expected UnknownDependency, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_task_ids_are_rejected() {
        let tasks = vec![task("a", &[]), task("a", &[])];
        assert!(matches!(
            validate(&tasks),
            Err(InvokerError::Configuration(_))
        ));
    }
}
