//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the call-control webhook, the relay WebSocket endpoint, and
//! the OpenAPI document.

use crate::{
    handlers::{self, StatusResponse},
    state::AppState,
    ws::ws_handler,
};

use axum::{
    Json, Router,
    routing::{any, get},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(handlers::root_status, handlers::incoming_call),
    components(schemas(StatusResponse)),
    tags(
        (name = "Voxray Bridge", description = "Call control for the telephony voice relay")
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Routes that need the shared state.
    let relay_router = Router::new()
        .route("/incoming-call", any(handlers::incoming_call))
        .route("/websocket", get(ws_handler))
        .with_state(app_state);

    Router::new()
        .route("/", get(handlers::root_status))
        .route("/api-docs/openapi.json", get(openapi_json))
        .merge(relay_router)
        .layer(TraceLayer::new_for_http())
}
