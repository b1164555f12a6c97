//! Turns one caller utterance into one reply frame.

use super::protocol::OutboundFrame;
use voxray_core::responder::ResponseGenerator;

/// Answers a single `prompt` frame.
///
/// A missing utterance is sent upstream as the empty string. The result is
/// always exactly one complete `text` frame; writing it is left to the caller.
pub async fn process_turn(
    responder: &ResponseGenerator,
    voice_prompt: Option<String>,
) -> OutboundFrame {
    let utterance = voice_prompt.unwrap_or_default();
    let reply = responder.generate(&utterance).await;
    OutboundFrame::reply(reply)
}
