//! Assistant Reply Generation
//!
//! Wraps a [`CompletionClient`] with the caller-facing contract of a live
//! call: every request yields a string. Failures are logged here and replaced
//! by a fixed fallback reply, so a broken upstream never reaches the socket.

use crate::llm_client::{CompletionClient, CompletionError};
use std::sync::Arc;
use tracing::{debug, error};

/// Spoken when the completion service rejects the request.
pub const UPSTREAM_ERROR_FALLBACK: &str =
    "Sorry, I am unable to process your request at the moment.";

/// Spoken when the request fails for any other reason.
pub const FAILURE_FALLBACK: &str = "Sorry, I encountered an error.";

/// Produces one assistant reply per caller utterance.
///
/// Holds the persona shared by every call. No history is kept: each
/// utterance is answered on its own.
pub struct ResponseGenerator {
    client: Arc<dyn CompletionClient>,
    persona: Arc<str>,
}

impl ResponseGenerator {
    pub fn new(client: Arc<dyn CompletionClient>, persona: impl Into<Arc<str>>) -> Self {
        Self {
            client,
            persona: persona.into(),
        }
    }

    /// Returns the trimmed assistant reply, or a fallback string on failure.
    pub async fn generate(&self, utterance: &str) -> String {
        match self.client.complete(&self.persona, utterance).await {
            Ok(reply) => {
                let reply = reply.trim().to_string();
                debug!(%reply, "Generated assistant reply");
                reply
            }
            Err(CompletionError::Upstream(message)) => {
                error!(%message, "Completion service returned an error");
                UPSTREAM_ERROR_FALLBACK.to_string()
            }
            Err(e) => {
                error!(error = %e, "Error calling completion service");
                FAILURE_FALLBACK.to_string()
            }
        }
    }
}
