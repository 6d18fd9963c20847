//! Tool System
//!
//! Tools are grouped under named providers. The agent loop only sees the
//! [`ToolCatalog`] interface: list what exists, invoke by (provider, tool).
//! [`ToolRegistry`] is the in-process catalog, built once at startup and
//! shared read-only between runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AgentError, Result};
use crate::schema::FunctionSet;

/// Parsed tool-call arguments
pub type Arguments = Map<String, Value>;

/// Parameter definition for tool schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, number, integer, boolean, object, array)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,
}

impl ParameterSchema {
    pub fn required(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required: true,
        }
    }

    pub fn optional(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }
}

/// One callable operation within a provider
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool name, unique within its provider
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Parameter definitions
    #[serde(default)]
    pub parameters: Vec<ParameterSchema>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    pub fn param(mut self, param: ParameterSchema) -> Self {
        self.parameters.push(param);
        self
    }

    /// JSON-Schema object describing the parameters
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in &self.parameters {
            properties.insert(
                param.name.clone(),
                json!({
                    "type": param.param_type,
                    "description": param.description,
                }),
            );
            if param.required {
                required.push(Value::String(param.name.clone()));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Reject calls missing a required parameter
    pub fn validate(&self, arguments: &Arguments) -> Result<()> {
        for param in &self.parameters {
            let present = arguments.get(&param.name).is_some_and(|v| !v.is_null());
            if param.required && !present {
                return Err(AgentError::ToolValidation(format!(
                    "Missing required parameter: {}",
                    param.name
                )));
            }
        }
        Ok(())
    }
}

/// Snapshot entry of the catalog, identified by (provider, name)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub provider: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl ToolDescriptor {
    /// Dotted display name, `provider.tool`
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.provider, self.name)
    }
}

/// Outcome of one tool invocation as recorded in the trajectory
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutput {
    pub const fn success(result: Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

impl From<Result<Value>> for ToolOutput {
    fn from(result: Result<Value>) -> Self {
        match result {
            Ok(value) => Self::success(value),
            Err(e) => Self::failure(e.to_string()),
        }
    }
}

/// Provider trait - implement to add a namespace of tools
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Unique provider name
    fn name(&self) -> &str;

    /// What the provider does
    fn description(&self) -> &str {
        ""
    }

    /// Tools exposed by this provider, in a stable order
    fn tools(&self) -> Vec<ToolSpec>;

    /// Execute one of this provider's tools
    async fn execute(&self, tool: &str, arguments: &Arguments) -> Result<Value>;
}

/// Read interface the agent loop depends on
#[async_trait]
pub trait ToolCatalog: Send + Sync {
    /// Snapshot of every tool, in registration order
    fn list_tools(&self) -> Vec<ToolDescriptor>;

    /// Invoke a tool by provider and tool name
    async fn execute(&self, provider: &str, tool: &str, arguments: &Arguments) -> Result<Value>;
}

fn describe(provider: &dyn ToolProvider) -> Vec<ToolDescriptor> {
    provider
        .tools()
        .into_iter()
        .map(|spec| ToolDescriptor {
            provider: provider.name().to_string(),
            input_schema: spec.input_schema(),
            name: spec.name,
            description: spec.description,
        })
        .collect()
}

/// Registry of tool providers, kept in registration order
#[derive(Default)]
pub struct ToolRegistry {
    providers: Vec<Arc<dyn ToolProvider>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new provider
    pub fn register<P: ToolProvider + 'static>(&mut self, provider: P) -> Result<()> {
        self.register_arc(Arc::new(provider))
    }

    /// Register a shared provider. Provider names must be unique and every
    /// tool must keep a distinct flat function name.
    pub fn register_arc(&mut self, provider: Arc<dyn ToolProvider>) -> Result<()> {
        let name = provider.name().to_string();
        if self.index.contains_key(&name) {
            return Err(AgentError::Config(format!(
                "Provider '{name}' is already registered"
            )));
        }

        let mut tools = self.list_tools();
        tools.extend(describe(provider.as_ref()));
        FunctionSet::build(&tools)?;

        tracing::info!(provider = %name, tools = provider.tools().len(), "Registered tool provider");
        self.index.insert(name, self.providers.len());
        self.providers.push(provider);
        Ok(())
    }

    /// Get a provider by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolProvider>> {
        self.index.get(name).map(|&i| Arc::clone(&self.providers[i]))
    }

    /// Provider names in registration order
    pub fn list_providers(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Number of registered providers
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[async_trait]
impl ToolCatalog for ToolRegistry {
    fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.providers
            .iter()
            .flat_map(|provider| describe(provider.as_ref()))
            .collect()
    }

    async fn execute(&self, provider: &str, tool: &str, arguments: &Arguments) -> Result<Value> {
        let handle = self
            .get(provider)
            .ok_or_else(|| AgentError::UnknownProvider(provider.to_string()))?;

        let spec = handle
            .tools()
            .into_iter()
            .find(|spec| spec.name == tool)
            .ok_or_else(|| AgentError::UnknownTool {
                provider: provider.to_string(),
                tool: tool.to_string(),
            })?;

        spec.validate(arguments)?;

        tracing::debug!(provider, tool, "Executing tool");
        handle.execute(tool, arguments).await
    }
}
