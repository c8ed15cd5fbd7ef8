//! Error types for the market reader core

use thiserror::Error;

/// Result type alias for reader operations
pub type Result<T> = std::result::Result<T, ReaderError>;

#[derive(Error, Debug)]
pub enum ReaderError {

    // =============================
    // Backend-local (recoverable)
    // =============================

    #[error("Backend transport error: {0}")]
    Transport(String),

    #[error("Backend schema violation: {0}")]
    Schema(String),

    // =============================
    // Pipeline Errors
    // =============================

    #[error("Solver subtask failed: {0}")]
    SolverSubtask(String),

    #[error("Invariant violation: {0}")]
    Invariant(String),

    #[error("Cycle already in progress")]
    CycleInProgress,

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReaderError {
    /// Backend-local failures that callers absorb with a closed-form
    /// substitute instead of failing the cycle.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ReaderError::Transport(_)
                | ReaderError::Schema(_)
                | ReaderError::SolverSubtask(_)
                | ReaderError::Serialization(_)
                | ReaderError::Http(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(ReaderError::Transport("timeout".into()).is_recoverable());
        assert!(ReaderError::Schema("missing field".into()).is_recoverable());
        assert!(ReaderError::SolverSubtask("t2 failed".into()).is_recoverable());
        assert!(!ReaderError::CycleInProgress.is_recoverable());
        assert!(!ReaderError::Config("no api key".into()).is_recoverable());
    }
}
