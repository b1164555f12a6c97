#![allow(dead_code)]

use async_trait::async_trait;
use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use tokio::sync::oneshot;
use tracing::Level;
use voxray_api::{
    config::{Config, TurnOrdering},
    router::create_router,
    state::AppState,
};
use voxray_core::{
    llm_client::{CompletionClient, CompletionError, CompletionSettings},
    responder::ResponseGenerator,
};

/// What a [`StubClient`] does with every request.
#[derive(Clone, Copy)]
pub enum Outcome {
    Reply(&'static str),
    Echo,
    UpstreamError,
    NetworkError,
}

/// Completion backend that never leaves the process.
pub struct StubClient(pub Outcome);

#[async_trait]
impl CompletionClient for StubClient {
    async fn complete(&self, _system: &str, user: &str) -> Result<String, CompletionError> {
        match self.0 {
            Outcome::Reply(reply) => Ok(reply.to_string()),
            Outcome::Echo => Ok(format!("echo: {}", user)),
            Outcome::UpstreamError => Err(CompletionError::Upstream(
                "The model is currently overloaded".to_string(),
            )),
            Outcome::NetworkError => {
                Err(CompletionError::Transport("connection reset".to_string()))
            }
        }
    }
}

pub fn test_config() -> Config {
    Config {
        bind_address: SocketAddr::from(([127, 0, 0, 1], 0)),
        openai_api_key: "test-key".to_string(),
        openai_api_base: "http://127.0.0.1:9/v1".to_string(),
        completion: CompletionSettings::default(),
        completion_timeout: None,
        action_url: "https://example.com/action-webhook".to_string(),
        stream_url: "wss://relay.example.com/websocket".to_string(),
        welcome_greeting: "Hi! Ask me anything!".to_string(),
        turn_ordering: TurnOrdering::Concurrent,
        log_level: Level::INFO,
        prompts_path: PathBuf::from("./prompts"),
    }
}

pub fn app_state(outcome: Outcome) -> Arc<AppState> {
    let client: Arc<dyn CompletionClient> = Arc::new(StubClient(outcome));
    Arc::new(AppState {
        responder: Arc::new(ResponseGenerator::new(client, "You are a test persona.")),
        config: Arc::new(test_config()),
    })
}

/// Serves the full router on an ephemeral port until the sender is dropped
/// or fired.
pub async fn spawn_server(state: Arc<AppState>) -> (SocketAddr, oneshot::Sender<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_router(state);

    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
    });

    (addr, tx)
}

pub const QUIET_PERIOD: Duration = Duration::from_millis(200);
