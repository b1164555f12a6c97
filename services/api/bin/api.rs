//! Main Entrypoint for the Voxray Bridge Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Loading the assistant persona from the prompts directory.
//! 3. Initializing the completion client and response generator.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::{Context, bail};
use async_openai::config::OpenAIConfig;
use std::{net::SocketAddr, path::Path, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use voxray_api::{config::Config, router::create_router, state::AppState};
use voxray_core::{
    llm_client::{CompletionClient, OpenAICompatibleClient},
    responder::ResponseGenerator,
};

const PERSONA_FILE: &str = "system_prompt.md";

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// Reads the assistant persona from the prompts directory.
fn load_persona(prompts_path: &Path) -> anyhow::Result<String> {
    let path = prompts_path.join(PERSONA_FILE);
    let persona = std::fs::read_to_string(&path)
        .with_context(|| format!("Could not read persona from {}", path.display()))?;
    if persona.trim().is_empty() {
        bail!("Persona file {} is empty", path.display());
    }
    Ok(persona)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Shared Services ---
    let persona = load_persona(&config.prompts_path)?;
    let openai_config = OpenAIConfig::new()
        .with_api_key(&config.openai_api_key)
        .with_api_base(&config.openai_api_base);
    let client: Arc<dyn CompletionClient> = Arc::new(
        OpenAICompatibleClient::new(
            openai_config,
            config.completion.clone(),
            config.completion_timeout,
        )
        .context("Failed to build completion client")?,
    );

    let app_state = Arc::new(AppState {
        responder: Arc::new(ResponseGenerator::new(client, persona)),
        config: Arc::new(config.clone()),
    });

    // --- 4. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 5. Start Server ---
    info!(
        model = %config.completion.model,
        turn_ordering = ?config.turn_ordering,
        stream_url = %config.stream_url,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    info!("Server is listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
