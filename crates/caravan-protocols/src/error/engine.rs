//! Engine errors.

use thiserror::Error;

/// Errors raised by workflow state operations and the executor.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("Step not found: {step_id} in workflow {workflow_id}")]
    StepNotFound { workflow_id: String, step_id: String },

    #[error("Cannot {attempted} in state {current}")]
    InvalidState { attempted: String, current: String },

    #[error("Step index {index} out of range (workflow has {len} steps)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("No handler registered for step: {0}")]
    MissingHandler(String),

    #[error("Workflow has no steps: {0}")]
    NoSteps(String),
}

impl EngineError {
    /// Build an [`EngineError::InvalidState`] from anything displayable.
    pub fn invalid_state(attempted: impl Into<String>, current: impl std::fmt::Display) -> Self {
        EngineError::InvalidState {
            attempted: attempted.into(),
            current: current.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_not_found() {
        let err = EngineError::WorkflowNotFound("wf-9".to_string());
        assert!(err.to_string().contains("not found"));
        assert!(err.to_string().contains("wf-9"));
    }

    #[test]
    fn test_step_not_found() {
        let err = EngineError::StepNotFound {
            workflow_id: "wf-1".to_string(),
            step_id: "load".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("load"));
        assert!(display.contains("wf-1"));
    }

    #[test]
    fn test_invalid_state_helper() {
        let err = EngineError::invalid_state("pause workflow", "COMPLETED");
        assert_eq!(err.to_string(), "Cannot pause workflow in state COMPLETED");
    }

    #[test]
    fn test_index_out_of_range() {
        let err = EngineError::IndexOutOfRange { index: 5, len: 3 };
        assert!(err.to_string().contains('5'));
        assert!(err.to_string().contains('3'));
    }
}
