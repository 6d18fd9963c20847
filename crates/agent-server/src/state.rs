//! Application State

use std::sync::Arc;

use agent_core::{Agent, AgentConfig, ToolRegistry};
use agent_runtime::{OpenAiConfig, OpenAiProvider};

use crate::config::ServerConfig;
use crate::prompt::PromptStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Tool registry built at startup
    pub catalog: Arc<ToolRegistry>,

    /// Connection pool for model requests
    pub http: reqwest::Client,

    /// Editable system prompt
    pub prompts: Arc<PromptStore>,

    pub config: Arc<ServerConfig>,
}

/// Per-request model endpoint settings
pub struct ModelTarget {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl AppState {
    pub fn new(config: ServerConfig, catalog: ToolRegistry, http: reqwest::Client) -> Self {
        Self {
            catalog: Arc::new(catalog),
            http,
            prompts: Arc::new(PromptStore::new(config.system_prompt_path.clone())),
            config: Arc::new(config),
        }
    }

    /// Agent bound to the caller's model endpoint and the shared catalog.
    ///
    /// The stored system prompt replaces the built-in one when it is not
    /// blank; a per-request override still wins over both.
    pub async fn agent(&self, target: ModelTarget) -> Agent {
        let provider = OpenAiProvider::with_client(
            self.http.clone(),
            OpenAiConfig {
                base_url: target.base_url,
                api_key: target.api_key,
                model: target.model,
                timeout_secs: self.config.model_timeout_secs,
            },
        );

        let mut config = AgentConfig {
            tool_timeout: Some(self.config.tool_timeout),
            ..AgentConfig::default()
        };
        match self.prompts.read().await {
            Ok(stored) if !stored.trim().is_empty() => config.system_prompt = stored,
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Could not read stored system prompt"),
        }

        Agent::new(Arc::new(provider), self.catalog.clone(), config)
    }
}
