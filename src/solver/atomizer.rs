//! Atomizer: decides whether a goal is directly answerable
//!
//! One structured call per goal. Reasoning is retained for audit only.
//! There is no local fallback here: a backend failure propagates to the
//! solver, whose caller still reaches a closed-form answer downstream.

use crate::backend::{propose, ModelTier, ReasoningBackend};
use crate::error::Result;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

pub(crate) const ATOMIZER_SCHEMA: &str = r#"{"atomic": boolean, "reasoning": string}"#;

#[derive(Debug, Clone, Deserialize)]
pub struct AtomDecision {
    pub atomic: bool,
    pub reasoning: String,
}

#[derive(Clone)]
pub struct Atomizer {
    backend: Arc<dyn ReasoningBackend>,
}

impl Atomizer {
    pub fn new(backend: Arc<dyn ReasoningBackend>) -> Self {
        Self { backend }
    }

    pub async fn classify(&self, goal: &str, context: &str) -> Result<AtomDecision> {
        let prompt = format!(
            "You route analytical questions about a market snapshot.\n\
             A question is ATOMIC when it can be answered in one direct step \
             from the context below, without decomposition into sub-questions.\n\n\
             Question:\n{}\n\nMarket context:\n{}",
            goal, context
        );

        let decision: AtomDecision =
            propose(self.backend.as_ref(), &prompt, ATOMIZER_SCHEMA, ModelTier::Fast).await?;

        debug!(atomic = decision.atomic, "Atomizer verdict");
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::error::ReaderError;

    #[tokio::test]
    async fn test_atomizer_returns_verdict_with_reasoning() {
        let backend = Arc::new(MockBackend { atomic: true, ..Default::default() });
        let atomizer = Atomizer::new(backend);
        let decision = atomizer.classify("Is momentum positive?", "ctx").await.unwrap();
        assert!(decision.atomic);
        assert!(!decision.reasoning.is_empty());
    }

    #[tokio::test]
    async fn test_atomizer_propagates_backend_failure() {
        let backend = Arc::new(MockBackend { fail_all: true, ..Default::default() });
        let atomizer = Atomizer::new(backend);
        let err = atomizer.classify("goal", "ctx").await.unwrap_err();
        assert!(matches!(err, ReaderError::Transport(_)));
    }
}
