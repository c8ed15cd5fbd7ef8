//! Planner: decomposes a non-atomic goal into independent sub-goals
//!
//! Each sub-goal must be answerable from the context alone; none may
//! depend on a sibling's result. That independence is what makes the
//! solver's concurrent fan-out safe. The contract is enforced twice:
//! once in the prompt, and once by a runtime filter that drops
//! sub-goals referencing sibling placeholders.

use crate::backend::{propose, ModelTier, ReasoningBackend};
use crate::error::Result;
use crate::models::SubTask;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

const MAX_SUBTASKS: usize = 5;
const MIN_SUBTASKS: usize = 3;

pub(crate) const PLANNER_SCHEMA: &str = r#"{"subtasks": [{"goal": string}]}"#;

#[derive(Debug, Deserialize)]
struct PlanResponse {
    #[serde(default)]
    subtasks: Vec<PlannedGoal>,
}

#[derive(Debug, Deserialize)]
struct PlannedGoal {
    goal: String,
}

#[derive(Clone)]
pub struct Planner {
    backend: Arc<dyn ReasoningBackend>,
}

impl Planner {
    pub fn new(backend: Arc<dyn ReasoningBackend>) -> Self {
        Self { backend }
    }

    /// Decompose `goal` into ordered sub-tasks. Any non-empty list is
    /// tolerated; an empty list means "effectively atomic" and is the
    /// caller's degenerate fallback, not an error.
    pub async fn plan(&self, goal: &str, context: &str) -> Result<Vec<SubTask>> {
        let prompt = self.build_prompt(goal, context);

        let response: PlanResponse =
            propose(self.backend.as_ref(), &prompt, PLANNER_SCHEMA, ModelTier::Smart).await?;

        let mut subtasks: Vec<SubTask> = response
            .subtasks
            .into_iter()
            .map(|p| p.goal.trim().to_string())
            .filter(|g| !g.is_empty())
            .filter(|g| {
                let independent = is_independent(g);
                if !independent {
                    warn!(sub_goal = %g, "Dropping sub-goal that references a sibling");
                }
                independent
            })
            .take(MAX_SUBTASKS)
            .enumerate()
            .map(|(i, goal)| SubTask {
                id: format!("t{}", i + 1),
                goal,
                result: None,
            })
            .collect();

        if subtasks.len() < MIN_SUBTASKS {
            debug!(count = subtasks.len(), "Planner returned a short plan");
        }

        // Ids stay dense after filtering.
        for (i, task) in subtasks.iter_mut().enumerate() {
            task.id = format!("t{}", i + 1);
        }

        Ok(subtasks)
    }

    fn build_prompt(&self, goal: &str, context: &str) -> String {
        format!(
            "You decompose one analytical question about a market snapshot \
             into {}-{} INDEPENDENT sub-questions.\n\n\
             Rules:\n\
             - Every sub-question must be answerable from the market context alone\n\
             - No sub-question may reference another sub-question or its result\n\
             - Each sub-question examines a distinct aspect (momentum, strike \
               distance vs time, orderbook, volatility, market pricing)\n\n\
             Question:\n{}\n\nMarket context:\n{}",
            MIN_SUBTASKS, MAX_SUBTASKS, goal, context
        )
    }
}

/// Runtime check of the independence contract: reject sub-goals that
/// name a sibling placeholder. Accepted behavior is unchanged when no
/// reference appears.
fn is_independent(goal: &str) -> bool {
    let lowered = goal.to_lowercase();
    if lowered.contains("previous subtask")
        || lowered.contains("previous sub-task")
        || lowered.contains("result of subtask")
        || lowered.contains("the answer above")
    {
        return false;
    }
    // Placeholder ids t1..t9 followed by a non-alphanumeric boundary.
    let bytes = lowered.as_bytes();
    for i in 0..bytes.len().saturating_sub(1) {
        if bytes[i] == b't' && bytes[i + 1].is_ascii_digit() {
            let before_ok = i == 0 || !bytes[i - 1].is_ascii_alphanumeric();
            let after_ok =
                i + 2 >= bytes.len() || !bytes[i + 2].is_ascii_alphanumeric();
            if before_ok && after_ok {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;

    #[tokio::test]
    async fn test_plan_assigns_dense_ids() {
        let backend = Arc::new(MockBackend::default());
        let planner = Planner::new(backend);
        let subtasks = planner.plan("Will it settle YES?", "ctx").await.unwrap();
        assert_eq!(subtasks.len(), 3);
        assert_eq!(subtasks[0].id, "t1");
        assert_eq!(subtasks[2].id, "t3");
        assert!(subtasks.iter().all(|t| t.result.is_none()));
    }

    #[tokio::test]
    async fn test_plan_clamps_oversized_plans() {
        let backend = Arc::new(MockBackend {
            plan_goals: (1..=8).map(|i| format!("Distinct angle number {}", i)).collect(),
            ..Default::default()
        });
        let planner = Planner::new(backend);
        let subtasks = planner.plan("goal", "ctx").await.unwrap();
        assert_eq!(subtasks.len(), 5);
    }

    #[tokio::test]
    async fn test_plan_tolerates_empty_list() {
        let backend = Arc::new(MockBackend { plan_goals: vec![], ..Default::default() });
        let planner = Planner::new(backend);
        let subtasks = planner.plan("goal", "ctx").await.unwrap();
        assert!(subtasks.is_empty());
    }

    #[tokio::test]
    async fn test_plan_drops_sibling_references() {
        let backend = Arc::new(MockBackend {
            plan_goals: vec![
                "Assess momentum from the 1h change".to_string(),
                "Combine t1 with the orderbook picture".to_string(),
                "Using the result of subtask one, decide".to_string(),
                "Assess strike distance against time remaining".to_string(),
            ],
            ..Default::default()
        });
        let planner = Planner::new(backend);
        let subtasks = planner.plan("goal", "ctx").await.unwrap();
        assert_eq!(subtasks.len(), 2);
        assert_eq!(subtasks[1].id, "t2");
    }

    #[test]
    fn test_independence_filter_boundaries() {
        assert!(is_independent("Assess the 15-minute window t+5"));
        assert!(!is_independent("Merge t1 and t2"));
        assert!(is_independent("Examine bt2 futures pricing")); // embedded, not a placeholder
    }
}
