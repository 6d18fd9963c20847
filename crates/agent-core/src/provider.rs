//! LLM Provider Strategy Pattern
//!
//! The Model Client seam: one request/response call against a chat
//! completions backend. Implementations report unreachable endpoints as
//! [`AgentError::Transport`](crate::AgentError::Transport), non-2xx answers
//! as [`AgentError::Protocol`](crate::AgentError::Protocol) and undecodable
//! bodies as [`AgentError::InvalidResponse`](crate::AgentError::InvalidResponse).
//! They never touch the transcript.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::provider::{CompletionRequest, LlmProvider, ToolChoice};
//!
//! let request = CompletionRequest {
//!     messages: transcript.messages(),
//!     functions: &functions.schemas,
//!     temperature: 0.7,
//!     tool_choice: ToolChoice::for_turn(1),
//! };
//! let completion = provider.complete(&request).await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::{Message, ToolCallRequest};
use crate::schema::FunctionSchema;

/// Whether the model must call a tool
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// The model has to call at least one tool
    Required,
    /// The model may answer directly
    Auto,
}

impl ToolChoice {
    /// Forced on the first turn of a run, automatic afterwards
    pub const fn for_turn(turn: usize) -> Self {
        if turn == 1 { Self::Required } else { Self::Auto }
    }
}

/// Everything a single model call needs
#[derive(Clone, Copy, Debug)]
pub struct CompletionRequest<'a> {
    /// Running transcript
    pub messages: &'a [Message],

    /// Function schemas; empty disables tool calling entirely
    pub functions: &'a [FunctionSchema],

    /// Sampling temperature
    pub temperature: f32,

    /// Tool-choice policy for this turn
    pub tool_choice: ToolChoice,
}

/// Token usage statistics
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// Response from one model call
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    /// Main content field
    pub content: Option<String>,

    /// Vendor-native reasoning, when the backend returns it separately
    pub reasoning: Option<String>,

    /// Tool calls requested by the model
    pub tool_calls: Vec<ToolCallRequest>,

    /// Finish reason as reported upstream
    pub finish_reason: Option<String>,

    /// Token usage (if available)
    pub usage: Option<TokenUsage>,

    /// Model that generated this response
    pub model: String,
}

impl Completion {
    /// Plain text answer with no tool calls
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            finish_reason: Some("stop".into()),
            ..Default::default()
        }
    }

    /// Tool-call response with no content
    pub fn tool_calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            tool_calls,
            finish_reason: Some("tool_calls".into()),
            ..Default::default()
        }
    }

    /// Content, empty when absent
    pub fn content_str(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }

    /// Native reasoning, if present and non-empty
    pub fn native_reasoning(&self) -> Option<&str> {
        self.reasoning.as_deref().filter(|r| !r.is_empty())
    }
}

/// Strategy trait for LLM providers
///
/// Implement this trait to add support for new LLM backends.
/// The agent works exclusively through this interface.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logs (e.g. "openai-compatible")
    fn name(&self) -> &str;

    /// Issue one chat-completions call
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<Completion>;
}
