//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Longest slice of an upstream response body kept for diagnostics
pub const MAX_ERROR_BODY_CHARS: usize = 500;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// Model endpoint could not be reached (DNS, connect, timeout)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Model endpoint answered with a non-success status
    #[error("API error {status}: {body}")]
    Protocol { status: u16, body: String },

    /// Model endpoint answered 2xx but the body is not a usable completion
    #[error("Invalid model response: {0}")]
    InvalidResponse(String),

    /// No provider registered under this name
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Provider exists but does not expose this tool
    #[error("Unknown tool '{tool}' in '{provider}'")]
    UnknownTool { provider: String, tool: String },

    /// Tool validation failed
    #[error("Tool validation error: {0}")]
    ToolValidation(String),

    /// Tool execution failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Tool did not answer within its budget
    #[error("Tool '{0}' timed out after {1}s")]
    ToolTimeout(String, u64),

    /// Two catalog entries flatten to the same function name
    #[error("Function name collision: '{flat_name}' is produced by both {first} and {second}")]
    NameCollision {
        flat_name: String,
        first: String,
        second: String,
    },

    /// Provider or tool name that cannot be flattened unambiguously
    #[error("Invalid tool name: {0}")]
    InvalidName(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    /// Build a protocol error, keeping only the head of the response body.
    pub fn protocol(status: u16, body: &str) -> Self {
        Self::Protocol {
            status,
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        }
    }

    /// Model-call failures end the run; everything else is isolated to one tool call.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Protocol { .. } | Self::InvalidResponse(_)
        )
    }

    /// Lookup failures the HTTP surface reports as "not found"
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::UnknownProvider(_) | Self::UnknownTool { .. })
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(_) => "The model service is currently unreachable. Please try again.".into(),
            Self::Protocol { status, .. } => format!("The model service rejected the request (HTTP {status})."),
            Self::InvalidResponse(_) => "The model service returned an unreadable response.".into(),
            Self::UnknownProvider(name) => format!("The tool provider '{name}' is not available."),
            Self::UnknownTool { provider, tool } => format!("The tool '{provider}.{tool}' is not available."),
            Self::ToolValidation(msg) => format!("Invalid tool input: {msg}"),
            Self::ToolExecution(msg) => format!("Tool error: {msg}"),
            Self::ToolTimeout(name, _) => format!("The tool '{name}' took too long to answer."),
            Self::NameCollision { .. } | Self::InvalidName(_) => {
                "The tool catalog is misconfigured.".into()
            }
            Self::Config(msg) => format!("Invalid request: {msg}"),
            Self::Io(_) => "Could not access server storage.".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_body_is_truncated() {
        let body = "x".repeat(2_000);
        let err = AgentError::protocol(500, &body);
        match err {
            AgentError::Protocol { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body.chars().count(), MAX_ERROR_BODY_CHARS);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(
            AgentError::protocol(401, "bad key").user_message(),
            "The model service rejected the request (HTTP 401)."
        );
        assert_eq!(
            AgentError::Config("max_turns must be at least 1".into()).user_message(),
            "Invalid request: max_turns must be at least 1"
        );
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(AgentError::from(io).user_message(), "Could not access server storage.");
    }

    #[test]
    fn test_fatality_split() {
        assert!(AgentError::Transport("refused".into()).is_fatal());
        assert!(AgentError::protocol(503, "busy").is_fatal());
        assert!(!AgentError::UnknownProvider("x".into()).is_fatal());
        assert!(!AgentError::ToolExecution("boom".into()).is_fatal());
    }
}
