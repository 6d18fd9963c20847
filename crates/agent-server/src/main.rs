//! Tool gateway HTTP Server
//!
//! Axum-based server exposing the tool catalog over REST and running the
//! agent loop against any OpenAI-compatible model endpoint.

mod config;
mod handlers;
mod prompt;
mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;
use crate::handlers::{
    execute_tool, generate, generate_stream, get_system_prompt, health_check, list_providers,
    list_tools, update_system_prompt,
};
use crate::state::AppState;

/// Routes over shared state
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & info
        .route("/health", get(health_check))

        // Tool catalog
        .route("/tools", get(list_tools))
        .route("/tools/providers", get(list_providers))
        .route("/tools/execute", post(execute_tool))

        // Agent API
        .route("/tools/agent/generate", post(generate))
        .route("/tools/agent/generate/stream", post(generate_stream))
        .route(
            "/tools/system-prompt",
            get(get_system_prompt).put(update_system_prompt),
        )

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();
    let config = ServerConfig::from_env();

    // Shared HTTP client for model and REST tool calls
    let http = reqwest::Client::new();

    // Initialize tools
    let catalog = gateway_tools::default_registry(http.clone())?;
    tracing::info!(providers = catalog.len(), "Tool catalog ready");
    for tool in agent_core::ToolCatalog::list_tools(&catalog) {
        tracing::info!("  • {}", tool.full_name());
    }

    let addr = config.bind_addr.clone();
    tracing::info!(path = %config.system_prompt_path.display(), "System prompt store");
    let state = AppState::new(config, catalog, http);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("tool gateway running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                       - Health check");
    tracing::info!("  GET  /tools                        - List tools");
    tracing::info!("  GET  /tools/providers              - List providers");
    tracing::info!("  POST /tools/execute                - Run one tool");
    tracing::info!("  POST /tools/agent/generate         - Run the agent loop");
    tracing::info!("  POST /tools/agent/generate/stream  - Run the agent loop (SSE)");
    tracing::info!("  GET  /tools/system-prompt          - Read system prompt");
    tracing::info!("  PUT  /tools/system-prompt          - Replace system prompt");

    axum::serve(listener, router(state)).await?;

    Ok(())
}
