//! Step handler errors.

use thiserror::Error;

/// Failure reported by a step handler.
///
/// Any variant marks the step FAILED; the message and details are recorded
/// on the step.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("{message}")]
    Failed {
        message: String,
        details: Option<serde_json::Value>,
    },
}

impl HandlerError {
    /// Plain failure with a message.
    pub fn failed(message: impl Into<String>) -> Self {
        HandlerError::Failed {
            message: message.into(),
            details: None,
        }
    }

    /// Failure carrying structured details.
    pub fn with_details(message: impl Into<String>, details: serde_json::Value) -> Self {
        HandlerError::Failed {
            message: message.into(),
            details: Some(details),
        }
    }

    /// Structured details, if the handler supplied any.
    pub fn details(&self) -> Option<&serde_json::Value> {
        match self {
            HandlerError::Failed { details, .. } => details.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failed_displays_message_only() {
        let err = HandlerError::failed("boom");
        assert_eq!(err.to_string(), "boom");
        assert!(err.details().is_none());
    }

    #[test]
    fn test_details_are_exposed() {
        let err = HandlerError::with_details("bad row", json!({"row": 7}));
        assert_eq!(err.details(), Some(&json!({"row": 7})));
    }

    #[test]
    fn test_invalid_input_display() {
        let err = HandlerError::InvalidInput("missing source".to_string());
        assert!(err.to_string().contains("Invalid input"));
        assert!(err.details().is_none());
    }
}
