//! OpenAI-compatible LLM Provider
//!
//! Implementation of `LlmProvider` for `/chat/completions` endpoints with
//! function calling.

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::{Message, ToolCallRequest},
    provider::{Completion, CompletionRequest, LlmProvider, TokenUsage, ToolChoice},
    schema::FunctionSchema,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Gemini's OpenAI-compatible endpoint
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai/";

/// Model used when none is configured
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// OpenAI-compatible provider configuration
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    /// Base URL; `/chat/completions` is appended
    pub base_url: String,

    /// Bearer token
    pub api_key: String,

    /// Model identifier
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: String::new(),
            model: DEFAULT_MODEL.into(),
            timeout_secs: 120,
        }
    }
}

impl OpenAiConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("OPENAI_BASE_URL").unwrap_or(defaults.base_url),
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            model: std::env::var("OPENAI_MODEL").unwrap_or(defaults.model),
            timeout_secs: std::env::var("MODEL_TIMEOUT_SECS")
                .ok()
                .and_then(|t| t.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }

    /// Full chat-completions URL
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Request body sent upstream
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [FunctionSchema]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parallel_tool_calls: Option<bool>,
}

impl<'a> ChatRequest<'a> {
    fn new(model: &'a str, request: &CompletionRequest<'a>) -> Self {
        let with_tools = !request.functions.is_empty();
        Self {
            model,
            messages: request.messages,
            temperature: request.temperature,
            tools: with_tools.then_some(request.functions),
            tool_choice: with_tools.then_some(request.tool_choice),
            parallel_tool_calls: with_tools.then_some(false),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    thinking: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallRequest>>,
}

impl ResponseMessage {
    fn native_reasoning(&mut self) -> Option<String> {
        [self.reasoning_content.take(), self.thinking.take()]
            .into_iter()
            .flatten()
            .find(|r| !r.is_empty())
    }
}

/// OpenAI-compatible LLM provider
pub struct OpenAiProvider {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    /// Create from configuration
    pub fn new(config: OpenAiConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Reuse an existing connection pool
    pub const fn with_client(client: reqwest::Client, config: OpenAiConfig) -> Self {
        Self { client, config }
    }

    /// Create from environment variables
    pub fn from_env() -> Self {
        Self::new(OpenAiConfig::from_env())
    }

    pub const fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    /// Convert the upstream body to a completion
    fn convert_response(body: &str, fallback_model: &str) -> Result<Completion> {
        let parsed: ChatResponse = serde_json::from_str(body)
            .map_err(|e| AgentError::InvalidResponse(e.to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::InvalidResponse("response has no choices".into()))?;

        let mut message = choice.message;
        Ok(Completion {
            reasoning: message.native_reasoning(),
            content: message.content,
            tool_calls: message.tool_calls.unwrap_or_default(),
            finish_reason: choice.finish_reason,
            usage: parsed.usage,
            model: parsed.model.unwrap_or_else(|| fallback_model.to_string()),
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<Completion> {
        let body = ChatRequest::new(&self.config.model, request);

        tracing::info!(
            model = %self.config.model,
            tools = request.functions.len(),
            messages = request.messages.len(),
            "Sending chat completion"
        );

        let response = self
            .client
            .post(self.config.endpoint())
            .bearer_auth(&self.config.api_key)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AgentError::Transport(e.to_string()))?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Model endpoint returned an error status");
            return Err(AgentError::protocol(status.as_u16(), &text));
        }

        let completion = Self::convert_response(&text, &self.config.model)?;
        tracing::info!(
            tool_calls = completion.tool_calls.len(),
            content_len = completion.content_str().len(),
            finish = completion.finish_reason.as_deref().unwrap_or("?"),
            "Received chat completion"
        );
        Ok(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::{FunctionSet, ToolDescriptor};
    use serde_json::json;

    #[test]
    fn test_config_defaults() {
        let config = OpenAiConfig::default();
        assert_eq!(config.model, "gemini-2.5-flash");
        assert_eq!(config.timeout_secs, 120);
        assert_eq!(
            config.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions"
        );
    }

    #[test]
    fn test_request_without_tools_omits_tool_fields() {
        let messages = vec![Message::system("sys"), Message::user("hi")];
        let request = CompletionRequest {
            messages: &messages,
            functions: &[],
            temperature: 0.2,
            tool_choice: ToolChoice::Required,
        };
        let body = serde_json::to_value(ChatRequest::new("m", &request)).unwrap();

        assert_eq!(body["model"], "m");
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
        assert!(body.get("parallel_tool_calls").is_none());
    }

    #[test]
    fn test_request_with_tools() {
        let set = FunctionSet::build(&[ToolDescriptor {
            provider: "calc".into(),
            name: "add".into(),
            description: "Add".into(),
            input_schema: json!({"type": "object"}),
        }])
        .unwrap();
        let messages = vec![Message::user("hi")];
        let request = CompletionRequest {
            messages: &messages,
            functions: &set.schemas,
            temperature: 0.7,
            tool_choice: ToolChoice::Auto,
        };
        let body = serde_json::to_value(ChatRequest::new("m", &request)).unwrap();

        assert_eq!(body["tools"][0]["function"]["name"], "calc__add");
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["parallel_tool_calls"], false);
    }

    #[test]
    fn test_reasoning_field_precedence() {
        let body = json!({
            "choices": [{
                "message": {"content": "answer", "reasoning_content": "", "thinking": "pondering"},
                "finish_reason": "stop"
            }]
        });
        let completion = OpenAiProvider::convert_response(&body.to_string(), "m").unwrap();
        assert_eq!(completion.reasoning.as_deref(), Some("pondering"));
        assert_eq!(completion.model, "m");
    }

    #[test]
    fn test_empty_choices_is_invalid() {
        let err = OpenAiProvider::convert_response(r#"{"choices": []}"#, "m").unwrap_err();
        assert!(matches!(err, AgentError::InvalidResponse(_)));
    }
}
