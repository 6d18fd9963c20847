//! Server configuration from the environment

use std::path::PathBuf;
use std::time::Duration;

/// Process-wide server settings
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listen address
    pub bind_addr: String,

    /// File backing the editable system prompt
    pub system_prompt_path: PathBuf,

    /// Budget for each tool invocation inside an agent run
    pub tool_timeout: Duration,

    /// Budget for each model request
    pub model_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".into(),
            system_prompt_path: PathBuf::from("system-prompt.md"),
            tool_timeout: Duration::from_secs(30),
            model_timeout_secs: 120,
        }
    }
}

impl ServerConfig {
    /// Read `BIND_ADDR`, `SYSTEM_PROMPT_PATH`, `TOOL_TIMEOUT_SECS` and
    /// `MODEL_TIMEOUT_SECS`, keeping defaults for anything unset or invalid
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            system_prompt_path: std::env::var("SYSTEM_PROMPT_PATH")
                .map_or(defaults.system_prompt_path, PathBuf::from),
            tool_timeout: secs_var("TOOL_TIMEOUT_SECS")
                .map_or(defaults.tool_timeout, Duration::from_secs),
            model_timeout_secs: secs_var("MODEL_TIMEOUT_SECS")
                .unwrap_or(defaults.model_timeout_secs),
        }
    }
}

fn secs_var(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(secs) => Some(secs),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "Ignoring non-numeric timeout");
            None
        }
    }
}
