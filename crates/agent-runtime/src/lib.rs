//! # agent-runtime
//!
//! Model clients for the tool gateway.
//!
//! ## Providers
//!
//! - **OpenAI-compatible** (default): any `/chat/completions` endpoint with
//!   function calling (OpenAI, Gemini's OpenAI layer, Groq, vLLM, ...)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::openai::{OpenAiConfig, OpenAiProvider};
//!
//! let provider = OpenAiProvider::new(OpenAiConfig::from_env());
//! let agent = AgentBuilder::new()
//!     .provider(Arc::new(provider))
//!     .catalog(Arc::new(registry))
//!     .build()?;
//! ```

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "openai")]
pub use openai::{OpenAiConfig, OpenAiProvider};

// Re-export core types for convenience
pub use agent_core::{
    Agent, AgentBuilder, AgentError, LlmProvider, Message, Result, Role, RunOptions, ToolCatalog,
    ToolProvider, ToolRegistry, TurnRecord,
};
