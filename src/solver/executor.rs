//! Executor: answers an atomic goal directly from context
//!
//! Fast tier, stateless, no visibility into sibling sub-results. That
//! blindness is what permits safe parallelism at each recursion level.

use crate::backend::{ModelTier, ReasoningBackend};
use crate::error::Result;
use std::sync::Arc;

pub(crate) const EXECUTOR_SYSTEM: &str = "You are a market analyst answering one \
narrow question. Ground every claim strictly in the provided market context; \
you are forbidden from introducing outside facts, news, or price levels not \
present in the context. Answer in 2-4 numerically specific sentences.";

#[derive(Clone)]
pub struct Executor {
    backend: Arc<dyn ReasoningBackend>,
}

impl Executor {
    pub fn new(backend: Arc<dyn ReasoningBackend>) -> Self {
        Self { backend }
    }

    pub async fn execute(&self, goal: &str, context: &str) -> Result<String> {
        self.backend
            .generate(goal, context, EXECUTOR_SYSTEM, ModelTier::Fast)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;

    #[tokio::test]
    async fn test_executor_uses_fast_tier_system_prompt() {
        let backend = Arc::new(MockBackend::default());
        let executor = Executor::new(backend.clone());
        let answer = executor.execute("Is momentum positive?", "ctx").await.unwrap();
        assert!(answer.contains("Is momentum positive?"));

        let log = backend.generate_log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0], EXECUTOR_SYSTEM);
    }
}
