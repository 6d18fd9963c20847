//! HTTP Handlers

use std::convert::Infallible;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::{StreamExt, stream};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use agent_core::{Arguments, RunOptions, ToolCatalog, ToolDescriptor, TurnRecord};
use agent_runtime::openai::{DEFAULT_BASE_URL, DEFAULT_MODEL};

use crate::state::{AppState, ModelTarget};

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub providers: usize,
    pub tools: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

#[derive(Debug, Serialize)]
pub struct ToolInfo {
    pub provider: String,
    pub name: String,
    pub full_name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl From<ToolDescriptor> for ToolInfo {
    fn from(tool: ToolDescriptor) -> Self {
        Self {
            full_name: tool.full_name(),
            provider: tool.provider,
            name: tool.name,
            description: tool.description,
            input_schema: tool.input_schema,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ToolListResponse {
    pub tools: Vec<ToolInfo>,
}

#[derive(Debug, Serialize)]
pub struct ProviderListResponse {
    pub providers: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub provider: String,
    pub tool: String,
    #[serde(default)]
    pub arguments: Arguments,
}

#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    pub provider: String,
    pub tool: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}

fn default_model() -> String {
    DEFAULT_MODEL.into()
}

const fn default_max_turns() -> usize {
    10
}

const fn default_temperature() -> f32 {
    0.7
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub system_prompt: String,
}

impl GenerateRequest {
    fn split(self) -> (String, ModelTarget, RunOptions) {
        let mut options = RunOptions::default()
            .max_turns(self.max_turns)
            .temperature(self.temperature);
        if !self.system_prompt.trim().is_empty() {
            options = options.system_prompt(self.system_prompt);
        }
        let target = ModelTarget {
            api_key: self.api_key,
            base_url: self.base_url,
            model: self.model,
        };
        (self.prompt, target, options)
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub turns: Vec<TurnRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One server-sent event of a streamed run
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum StreamEvent {
    Turn { turn: TurnRecord },
    Done,
    Error { error: String },
}

impl StreamEvent {
    fn into_event(self) -> Event {
        Event::default().json_data(&self).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Could not encode stream event");
            Event::default().data(r#"{"type":"error","error":"unencodable event"}"#)
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemPrompt {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub success: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        providers: state.catalog.len(),
        tools: state.catalog.list_tools().len(),
    })
}

/// Every tool across every provider
pub async fn list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    Json(ToolListResponse {
        tools: state.catalog.list_tools().into_iter().map(ToolInfo::from).collect(),
    })
}

/// Registered provider names
pub async fn list_providers(State(state): State<AppState>) -> Json<ProviderListResponse> {
    Json(ProviderListResponse {
        providers: state
            .catalog
            .list_providers()
            .into_iter()
            .map(String::from)
            .collect(),
    })
}

/// Direct tool invocation, outside any agent run
pub async fn execute_tool(
    State(state): State<AppState>,
    Json(payload): Json<ExecuteRequest>,
) -> Result<Json<ExecuteResponse>, ApiError> {
    let outcome = state
        .catalog
        .execute(&payload.provider, &payload.tool, &payload.arguments)
        .await;

    let (result, error) = match outcome {
        Ok(value) => (Some(value), None),
        Err(e) if e.is_not_found() => {
            return Err(api_error(StatusCode::NOT_FOUND, "NOT_FOUND", e.user_message()));
        }
        Err(e) => {
            tracing::warn!(
                provider = %payload.provider,
                tool = %payload.tool,
                error = %e,
                "Tool execution failed"
            );
            (None, Some(e.user_message()))
        }
    };

    Ok(Json(ExecuteResponse {
        success: error.is_none(),
        provider: payload.provider,
        tool: payload.tool,
        result,
        error,
    }))
}

/// Run the agent loop and return the whole trajectory
pub async fn generate(
    State(state): State<AppState>,
    Json(payload): Json<GenerateRequest>,
) -> Json<GenerateResponse> {
    let (prompt, target, options) = payload.split();
    let agent = state.agent(target).await;

    match agent.run(prompt, options).await {
        Ok(turns) => Json(GenerateResponse {
            success: true,
            turns,
            error: None,
        }),
        Err(e) => {
            tracing::error!(error = %e, "Agent generation failed");
            Json(GenerateResponse {
                success: false,
                turns: Vec::new(),
                error: Some(e.user_message()),
            })
        }
    }
}

/// Run the agent loop and stream each turn as a server-sent event
pub async fn generate_stream(
    State(state): State<AppState>,
    Json(payload): Json<GenerateRequest>,
) -> impl IntoResponse {
    let (prompt, target, options) = payload.split();
    let agent = state.agent(target).await;

    let events = match agent.run_stream(prompt, options) {
        Ok(turns) => turns
            .map(|turn| StreamEvent::Turn { turn })
            .chain(stream::once(async { StreamEvent::Done }))
            .boxed(),
        Err(e) => {
            tracing::error!(error = %e, "Agent generation failed");
            stream::once(async move {
                StreamEvent::Error {
                    error: e.user_message(),
                }
            })
            .boxed()
        }
    };

    let sse = Sse::new(events.map(|event| Ok::<_, Infallible>(event.into_event())))
        .keep_alive(KeepAlive::default());

    (
        [("cache-control", "no-cache"), ("x-accel-buffering", "no")],
        sse,
    )
}

/// Read the stored system prompt
pub async fn get_system_prompt(
    State(state): State<AppState>,
) -> Result<Json<SystemPrompt>, ApiError> {
    let content = state.prompts.read().await.map_err(|e| {
        tracing::error!(error = %e, "Could not read system prompt");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "PROMPT_READ_ERROR", e.user_message())
    })?;
    Ok(Json(SystemPrompt { content }))
}

/// Replace the stored system prompt
pub async fn update_system_prompt(
    State(state): State<AppState>,
    Json(payload): Json<SystemPrompt>,
) -> Result<Json<UpdateResponse>, ApiError> {
    state.prompts.write(&payload.content).await.map_err(|e| {
        tracing::error!(error = %e, "Could not write system prompt");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "PROMPT_WRITE_ERROR", e.user_message())
    })?;
    Ok(Json(UpdateResponse { success: true }))
}
