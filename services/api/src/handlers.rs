//! Axum Handlers for the HTTP Routes
//!
//! The status probe and the call-control webhook. Neither can fail; both
//! carry `utoipa` annotations for the OpenAPI document.

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use crate::{call_control::CallControlDocument, state::AppState};

pub const STATUS_MESSAGE: &str = "Twilio VoxRay is running!";

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct StatusResponse {
    #[schema(example = "Twilio VoxRay is running!")]
    pub message: String,
}

/// Report that the service is up.
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service is running", body = StatusResponse)
    )
)]
pub async fn root_status() -> Json<StatusResponse> {
    Json(StatusResponse {
        message: STATUS_MESSAGE.to_string(),
    })
}

/// Answer an incoming call by connecting it to the relay WebSocket.
///
/// Mounted for every HTTP method; the request body is ignored.
#[utoipa::path(
    post,
    path = "/incoming-call",
    responses(
        (status = 200, description = "TwiML connecting the call to the relay", body = String, content_type = "text/xml")
    )
)]
pub async fn incoming_call(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let document = CallControlDocument::from_config(&state.config);
    info!(stream_url = %document.stream_url, "Incoming call; connecting to relay");
    ([(header::CONTENT_TYPE, "text/xml")], document.render())
}
