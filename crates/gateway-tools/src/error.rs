//! Error Types for built-in tools

use agent_core::AgentError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ToolKitError>;

/// Longest upstream body kept in a status error
const MAX_BODY_CHARS: usize = 500;

#[derive(Error, Debug)]
pub enum ToolKitError {
    #[error("Invalid expression: {0}")]
    Syntax(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Result is not a finite number")]
    NotFinite,

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ToolKitError {
    pub fn status(status: u16, body: &str) -> Self {
        Self::Status {
            status,
            body: body.chars().take(MAX_BODY_CHARS).collect(),
        }
    }
}

impl From<ToolKitError> for AgentError {
    fn from(err: ToolKitError) -> Self {
        match err {
            ToolKitError::Syntax(_) => Self::ToolValidation(err.to_string()),
            other => Self::ToolExecution(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_into_agent_error() {
        let err: AgentError = ToolKitError::DivisionByZero.into();
        assert_eq!(err.to_string(), "Tool execution error: Division by zero");

        let err: AgentError = ToolKitError::Syntax("unexpected ')'".into()).into();
        assert!(matches!(err, AgentError::ToolValidation(_)));
    }

    #[test]
    fn test_status_body_truncated() {
        let err = ToolKitError::status(502, &"x".repeat(2_000));
        match err {
            ToolKitError::Status { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body.len(), MAX_BODY_CHARS);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
