//! Aggregator: synthesizes resolved sub-answers into one thesis
//!
//! Smart tier. Receives every sub-task's id, goal and result verbatim
//! and nothing else; must integrate them into a numerically specific
//! conclusion rather than concatenate.

use crate::backend::{ModelTier, ReasoningBackend};
use crate::error::Result;
use crate::models::SubTask;
use std::sync::Arc;

pub(crate) const AGGREGATOR_SYSTEM: &str = "You synthesize several partial market \
analyses into one coherent thesis. Integrate the findings: weigh them against \
each other, resolve disagreements, and state a numerically specific conclusion \
about the original question. Do not merely restate each finding.";

#[derive(Clone)]
pub struct Aggregator {
    backend: Arc<dyn ReasoningBackend>,
}

impl Aggregator {
    pub fn new(backend: Arc<dyn ReasoningBackend>) -> Self {
        Self { backend }
    }

    pub async fn aggregate(
        &self,
        parent_goal: &str,
        context: &str,
        subtasks: &[SubTask],
    ) -> Result<String> {
        let findings = subtasks
            .iter()
            .map(|t| {
                format!(
                    "[{}] {}\n{}",
                    t.id,
                    t.goal,
                    t.result.as_deref().unwrap_or("(no result)")
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let goal = format!(
            "Original question:\n{}\n\nResolved sub-analyses:\n{}",
            parent_goal, findings
        );

        self.backend
            .generate(&goal, context, AGGREGATOR_SYSTEM, ModelTier::Smart)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;

    #[tokio::test]
    async fn test_aggregator_passes_every_subtask_verbatim() {
        let backend = Arc::new(MockBackend::default());
        let aggregator = Aggregator::new(backend.clone());

        let subtasks = vec![
            SubTask {
                id: "t1".to_string(),
                goal: "Momentum".to_string(),
                result: Some("1h change is +0.42%".to_string()),
            },
            SubTask {
                id: "t2".to_string(),
                goal: "Orderbook".to_string(),
                result: Some("YES side carries 60% of depth".to_string()),
            },
        ];

        let answer = aggregator.aggregate("Settle YES?", "ctx", &subtasks).await.unwrap();
        // Mock echoes the goal back; both findings must have reached it.
        assert!(answer.contains("1h change is +0.42%"));
        assert!(answer.contains("YES side carries 60% of depth"));

        let log = backend.generate_log.lock().unwrap();
        assert_eq!(log[0], AGGREGATOR_SYSTEM);
    }
}
