//! # agent-core
//!
//! Agent loop and tool-invocation protocol for the tool gateway.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                             Agent                                │
//! │  ┌─────────────┐  ┌──────────────┐  ┌──────────────────────────┐ │
//! │  │  Reasoning  │──│    Turn      │──│ ToolCatalog              │ │
//! │  │    Loop     │  │  Processor   │  │ (providers → tools)      │ │
//! │  └─────────────┘  └──────────────┘  └──────────────────────────┘ │
//! │         │          function schemas + name map                   │
//! │  ┌─────────────┐                                                 │
//! │  │ LlmProvider │  OpenAI-compatible chat completions             │
//! │  └─────────────┘                                                 │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` and `ToolCatalog` traits are the only seams the loop
//! depends on; both are injected as `Arc`s and shared across runs.

pub mod error;
pub mod message;
pub mod provider;
pub mod reasoning;
pub mod schema;
pub mod tool;
pub mod turn;

pub use error::{AgentError, Result};
pub use message::{Message, Role, ToolCallRequest, Transcript};
pub use provider::{Completion, CompletionRequest, LlmProvider, ToolChoice};
pub use reasoning::{Agent, AgentBuilder, AgentConfig, RunOptions, Trajectory, TurnStream};
pub use schema::{FunctionSchema, FunctionSet, NameMap, ToolRef};
pub use tool::{
    Arguments, ParameterSchema, ToolCatalog, ToolDescriptor, ToolOutput, ToolProvider,
    ToolRegistry, ToolSpec,
};
pub use turn::{ToolCallRecord, TurnRecord};
