//! Recursive solver
//!
//! Drives Atomizer → (Planner → concurrent fan-out → Aggregator) to a
//! bounded depth. `max_depth` is threaded explicitly through every call
//! rather than inferred from the call stack, capping worst-case leaf
//! calls at fanout^max_depth. Failure policy is fail-fast: any subtask
//! error aborts the whole tree; the surrounding pipeline still produces
//! a result through the closed-form fallback at the extraction boundary.

use crate::backend::ReasoningBackend;
use crate::error::{ReaderError, Result};
use crate::models::SolveResult;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info};

pub mod aggregator;
pub mod atomizer;
pub mod executor;
pub mod planner;

pub use aggregator::Aggregator;
pub use atomizer::Atomizer;
pub use executor::Executor;
pub use planner::Planner;

#[derive(Clone)]
pub struct Solver {
    atomizer: Atomizer,
    planner: Planner,
    executor: Executor,
    aggregator: Aggregator,
    max_depth: usize,
}

impl Solver {
    pub fn new(backend: Arc<dyn ReasoningBackend>, max_depth: usize) -> Self {
        Self {
            atomizer: Atomizer::new(backend.clone()),
            planner: Planner::new(backend.clone()),
            executor: Executor::new(backend.clone()),
            aggregator: Aggregator::new(backend),
            max_depth,
        }
    }

    /// Solve a goal from the root of the recursion.
    pub async fn solve(&self, goal: &str, context: &str) -> Result<SolveResult> {
        self.solve_at(goal.to_string(), context.to_string(), 0).await
    }

    /// Solve with the depth forced to the bound, yielding exactly one
    /// Executor call. Used by the AI-assisted risk path.
    pub async fn solve_atomic(&self, goal: &str, context: &str) -> Result<SolveResult> {
        self.solve_at(goal.to_string(), context.to_string(), self.max_depth)
            .await
    }

    /// One recursion level. Owned arguments so sibling sub-solves can be
    /// spawned as independent tasks.
    fn solve_at(
        &self,
        goal: String,
        context: String,
        depth: usize,
    ) -> Pin<Box<dyn Future<Output = Result<SolveResult>> + Send + '_>> {
        Box::pin(async move {
            if depth >= self.max_depth {
                debug!(depth, "Depth bound reached, executing atomically");
                return self.atomic_execute(&goal, &context).await;
            }

            let decision = self.atomizer.classify(&goal, &context).await?;
            if decision.atomic {
                debug!(depth, reasoning = %decision.reasoning, "Goal classified atomic");
                return self.atomic_execute(&goal, &context).await;
            }

            let mut subtasks = self.planner.plan(&goal, &context).await?;
            if subtasks.is_empty() {
                // Degenerate plan: treat the goal as effectively atomic.
                debug!(depth, "Planner returned no subtasks, executing atomically");
                return self.atomic_execute(&goal, &context).await;
            }

            info!(depth, fanout = subtasks.len(), "Fanning out subtasks");

            // Fan-out: all siblings run concurrently; fan-in joins every
            // one before aggregation. First failure aborts the set.
            let mut set = tokio::task::JoinSet::new();
            for (idx, task) in subtasks.iter().enumerate() {
                let solver = self.clone();
                let sub_goal = task.goal.clone();
                let sub_context = context.clone();
                set.spawn(async move {
                    let outcome = solver.solve_at(sub_goal, sub_context, depth + 1).await;
                    (idx, outcome)
                });
            }

            let mut answers: Vec<Option<String>> = vec![None; subtasks.len()];
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((idx, Ok(result))) => answers[idx] = Some(result.answer),
                    Ok((idx, Err(e))) => {
                        set.abort_all();
                        return Err(ReaderError::SolverSubtask(format!(
                            "{} ({}): {}",
                            subtasks[idx].id, subtasks[idx].goal, e
                        )));
                    }
                    Err(e) => {
                        set.abort_all();
                        return Err(ReaderError::SolverSubtask(format!(
                            "subtask join failed: {}",
                            e
                        )));
                    }
                }
            }

            for (task, answer) in subtasks.iter_mut().zip(answers) {
                task.result = answer;
            }

            let answer = self.aggregator.aggregate(&goal, &context, &subtasks).await?;

            Ok(SolveResult {
                answer,
                subtasks,
                was_atomic: false,
            })
        })
    }

    async fn atomic_execute(&self, goal: &str, context: &str) -> Result<SolveResult> {
        let answer = self.executor.execute(goal, context).await?;
        Ok(SolveResult {
            answer,
            subtasks: Vec::new(),
            was_atomic: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use executor::EXECUTOR_SYSTEM;

    fn executor_calls(backend: &MockBackend) -> usize {
        backend
            .generate_log
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.as_str() == EXECUTOR_SYSTEM)
            .count()
    }

    #[tokio::test]
    async fn test_atomic_goal_short_circuits() {
        let backend = Arc::new(MockBackend { atomic: true, ..Default::default() });
        let solver = Solver::new(backend.clone(), 2);

        let result = solver.solve("Is momentum positive?", "ctx").await.unwrap();
        assert!(result.was_atomic);
        assert!(result.subtasks.is_empty());
        assert_eq!(executor_calls(&backend), 1);
    }

    #[tokio::test]
    async fn test_depth_bound_caps_leaf_calls() {
        // max_depth=1 with a 5-item plan issues exactly 5 executor calls.
        let backend = Arc::new(MockBackend {
            plan_goals: (1..=5).map(|i| format!("Distinct aspect number {}", i)).collect(),
            ..Default::default()
        });
        let solver = Solver::new(backend.clone(), 1);

        let result = solver.solve("Will it settle YES?", "ctx").await.unwrap();
        assert!(!result.was_atomic);
        assert_eq!(result.subtasks.len(), 5);
        assert!(result.subtasks.iter().all(|t| t.result.is_some()));
        assert_eq!(executor_calls(&backend), 5);
    }

    #[tokio::test]
    async fn test_degenerate_plan_treated_as_atomic() {
        let backend = Arc::new(MockBackend { plan_goals: vec![], ..Default::default() });
        let solver = Solver::new(backend.clone(), 1);

        let result = solver.solve("goal", "ctx").await.unwrap();
        assert!(result.was_atomic);
        assert!(result.subtasks.is_empty());
        assert_eq!(executor_calls(&backend), 1);
    }

    #[tokio::test]
    async fn test_results_reattach_in_plan_order() {
        let backend = Arc::new(MockBackend {
            plan_goals: vec![
                "First angle".to_string(),
                "Second angle".to_string(),
                "Third angle".to_string(),
            ],
            ..Default::default()
        });
        let solver = Solver::new(backend, 1);

        let result = solver.solve("goal", "ctx").await.unwrap();
        for (i, task) in result.subtasks.iter().enumerate() {
            assert_eq!(task.id, format!("t{}", i + 1));
            // Mock leaf answers echo their own goal back.
            assert!(task.result.as_ref().unwrap().contains(&task.goal));
        }
    }

    #[tokio::test]
    async fn test_solver_fails_fast_on_backend_failure() {
        let backend = Arc::new(MockBackend { fail_all: true, ..Default::default() });
        let solver = Solver::new(backend, 1);

        let err = solver.solve("goal", "ctx").await.unwrap_err();
        // Depth 0 atomizer call fails before any fan-out.
        assert!(matches!(err, ReaderError::Transport(_)));
    }

    #[tokio::test]
    async fn test_subtask_failure_aborts_tree() {
        // Structured stages succeed, so the plan fans out; every leaf
        // executor call then fails and the tree aborts fail-fast.
        let backend = Arc::new(MockBackend { fail_generate: true, ..Default::default() });
        let solver = Solver::new(backend, 1);

        let err = solver.solve("goal", "ctx").await.unwrap_err();
        assert!(matches!(err, ReaderError::SolverSubtask(_)));
    }

    #[tokio::test]
    async fn test_solve_atomic_ignores_planner() {
        let backend = Arc::new(MockBackend::default());
        let solver = Solver::new(backend.clone(), 2);

        let result = solver.solve_atomic("Risk check", "ctx").await.unwrap();
        assert!(result.was_atomic);
        assert_eq!(executor_calls(&backend), 1);
    }
}
