//! Reasoning Loop
//!
//! Drives one prompt through a bounded sequence of model calls and tool
//! executions. Turn 1 forces a tool call; later turns let the model stop.
//! The run ends on the first turn without tool calls, on a failed model
//! call, or after `max_turns` turns.

use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AgentError, Result};
use crate::message::Transcript;
use crate::provider::{CompletionRequest, LlmProvider, ToolChoice};
use crate::schema::FunctionSet;
use crate::tool::{ToolCatalog, ToolDescriptor};
use crate::turn::{TurnProcessor, TurnRecord, extract_sections};

/// Replaced with the rendered tool list when present in a system prompt
pub const TOOL_LIST_PLACEHOLDER: &str = "{tool_list}";

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant. You MUST use tools to answer every question. \
NEVER answer from memory alone. Structure responses with [REASONING] and [MESSAGE] sections.";

/// Lazy, finite sequence of turn records for one run
pub type TurnStream = Pin<Box<dyn Stream<Item = TurnRecord> + Send>>;

/// Every turn record of a run, in turn order
pub type Trajectory = Vec<TurnRecord>;

/// Agent configuration shared by every run
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// System prompt used when a run carries no override
    pub system_prompt: String,

    /// Budget for each tool invocation
    pub tool_timeout: Option<Duration>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            tool_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Per-run options
#[derive(Clone, Debug)]
pub struct RunOptions {
    /// Upper bound on model calls, at least 1
    pub max_turns: usize,

    /// Sampling temperature
    pub temperature: f32,

    /// Replaces the configured system prompt; blank counts as absent
    pub system_prompt: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_turns: 10,
            temperature: 0.7,
            system_prompt: None,
        }
    }
}

impl RunOptions {
    pub const fn max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub const fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

/// Bullet list of every catalog entry, as shown in the system prompt
pub fn render_tool_list(tools: &[ToolDescriptor]) -> String {
    if tools.is_empty() {
        return "- (no tools available)".into();
    }
    tools
        .iter()
        .map(|t| format!("- `{}`: {}", t.full_name(), t.description))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Interpolate the tool list at the placeholder, or append it under a heading
pub fn build_system_prompt(template: &str, tools: &[ToolDescriptor]) -> String {
    let tool_list = render_tool_list(tools);
    if template.contains(TOOL_LIST_PLACEHOLDER) {
        template.replace(TOOL_LIST_PLACEHOLDER, &tool_list)
    } else {
        format!("{template}\n\n## Available tools\n{tool_list}")
    }
}

/// The main Agent struct
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    catalog: Arc<dyn ToolCatalog>,
    config: AgentConfig,
}

impl Agent {
    /// Create a new agent
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        catalog: Arc<dyn ToolCatalog>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            catalog,
            config,
        }
    }

    /// Create with default configuration
    pub fn with_defaults(provider: Arc<dyn LlmProvider>, catalog: Arc<dyn ToolCatalog>) -> Self {
        Self::new(provider, catalog, AgentConfig::default())
    }

    /// Start a run and stream its turn records as they are produced.
    ///
    /// Nothing is sent to the model until the stream is polled. Errors here
    /// are host-level: invalid options or a catalog that cannot be turned
    /// into function schemas. Model failures arrive as a final record.
    pub fn run_stream(&self, prompt: impl Into<String>, options: RunOptions) -> Result<TurnStream> {
        if options.max_turns == 0 {
            return Err(AgentError::Config("max_turns must be at least 1".into()));
        }

        let tools = self.catalog.list_tools();
        let functions = FunctionSet::build(&tools)?;

        let template = options
            .system_prompt
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| self.config.system_prompt.clone());
        let transcript = Transcript::start(build_system_prompt(&template, &tools), prompt);

        let run = Run {
            provider: Arc::clone(&self.provider),
            catalog: Arc::clone(&self.catalog),
            tool_timeout: self.config.tool_timeout,
            functions,
            transcript,
            turn: 1,
            max_turns: options.max_turns,
            temperature: options.temperature,
            finished: false,
        };

        Ok(Box::pin(futures::stream::unfold(run, |mut run| async move {
            let record = run.step().await?;
            Some((record, run))
        })))
    }

    /// Run to completion and return the whole trajectory
    pub async fn run(&self, prompt: impl Into<String>, options: RunOptions) -> Result<Trajectory> {
        Ok(self.run_stream(prompt, options)?.collect().await)
    }
}

/// State owned by a single run
struct Run {
    provider: Arc<dyn LlmProvider>,
    catalog: Arc<dyn ToolCatalog>,
    tool_timeout: Option<Duration>,
    functions: FunctionSet,
    transcript: Transcript,
    turn: usize,
    max_turns: usize,
    temperature: f32,
    finished: bool,
}

impl Run {
    async fn step(&mut self) -> Option<TurnRecord> {
        if self.finished || self.turn > self.max_turns {
            return None;
        }
        let turn = self.turn;
        self.turn += 1;

        let request = CompletionRequest {
            messages: self.transcript.messages(),
            functions: &self.functions.schemas,
            temperature: self.temperature,
            tool_choice: ToolChoice::for_turn(turn),
        };
        tracing::info!(
            turn,
            provider = self.provider.name(),
            tools = request.functions.len(),
            messages = request.messages.len(),
            tool_choice = ?request.tool_choice,
            "Calling model"
        );

        let completion = match self.provider.complete(&request).await {
            Ok(completion) => completion,
            Err(e) => {
                tracing::error!(turn, error = %e, "Model call failed");
                self.finished = true;
                return Some(TurnRecord::failure(turn, &e));
            }
        };

        if completion.tool_calls.is_empty() {
            self.finished = true;
            let (reasoning, message) = extract_sections(&completion);
            tracing::info!(turn, "Run completed");
            return Some(TurnRecord::answer(turn, reasoning, message));
        }

        let record = TurnProcessor::new(self.catalog.as_ref(), &self.functions.names)
            .with_tool_timeout(self.tool_timeout)
            .process(turn, completion, &mut self.transcript)
            .await;

        if turn == self.max_turns {
            tracing::warn!(max_turns = self.max_turns, "Turn limit reached without a final answer");
            self.finished = true;
        }
        Some(record)
    }
}

/// Builder for Agent configuration
#[derive(Default)]
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    catalog: Option<Arc<dyn ToolCatalog>>,
    config: AgentConfig,
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn catalog(mut self, catalog: Arc<dyn ToolCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    pub const fn tool_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.tool_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;
        let catalog = self
            .catalog
            .ok_or_else(|| AgentError::Config("Tool catalog is required".into()))?;

        Ok(Agent::new(provider, catalog, self.config))
    }
}
