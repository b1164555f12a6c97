//! Defines the JSON frame protocol spoken by the telephony relay over the
//! `/websocket` connection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frames received from the relay.
///
/// Dispatch is by the `type` field. Anything that is valid JSON but not one
/// of the known types decodes to [`InboundFrame::Unrecognized`].
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Handshake sent once the call is connected.
    Setup { call_sid: Option<String> },
    /// A transcribed caller utterance.
    Prompt { voice_prompt: Option<String> },
    /// The caller spoke over the assistant.
    Interrupt(Value),
    /// The relay reports a problem on its side.
    Error(Value),
    /// Any other `type` value, a missing `type`, or a non-object document.
    Unrecognized(Value),
}

/// Messages sent from the server to the relay.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// Text for the relay to speak. `last` marks the end of the reply.
    Text { token: String, last: bool },
}

impl OutboundFrame {
    /// A complete, single-frame reply.
    pub fn reply(token: impl Into<String>) -> Self {
        Self::Text {
            token: token.into(),
            last: true,
        }
    }
}

/// The payload was not valid JSON.
#[derive(Debug, thiserror::Error)]
#[error("failed to decode frame: {0}")]
pub struct FrameDecodeError(#[from] serde_json::Error);

/// Decodes one WebSocket message into a frame.
///
/// Only a syntax error fails. A `voicePrompt` that is missing or not a
/// string decodes as `None`.
pub fn decode_frame(raw: &[u8]) -> Result<InboundFrame, FrameDecodeError> {
    let payload: Value = serde_json::from_slice(raw)?;

    let frame = match payload.get("type").and_then(Value::as_str) {
        Some("setup") => InboundFrame::Setup {
            call_sid: string_field(&payload, "callSid"),
        },
        Some("prompt") => InboundFrame::Prompt {
            voice_prompt: string_field(&payload, "voicePrompt"),
        },
        Some("interrupt") => InboundFrame::Interrupt(payload),
        Some("error") => InboundFrame::Error(payload),
        _ => InboundFrame::Unrecognized(payload),
    };
    Ok(frame)
}

/// Serializes an outbound frame to its JSON text.
pub fn encode_frame(frame: &OutboundFrame) -> serde_json::Result<String> {
    serde_json::to_string(frame)
}

fn string_field(payload: &Value, key: &str) -> Option<String> {
    payload.get(key).and_then(Value::as_str).map(str::to_owned)
}
