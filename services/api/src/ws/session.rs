//! Manages the WebSocket connection lifecycle for one relayed call.

use super::{
    protocol::{InboundFrame, OutboundFrame, decode_frame, encode_frame},
    turn::process_turn,
};
use crate::{config::TurnOrdering, state::AppState};
use anyhow::Result;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, instrument, warn};
use uuid::Uuid;
use voxray_core::responder::ResponseGenerator;

/// Replies waiting for the socket writer.
const OUTBOUND_BUFFER: usize = 32;

/// Prompts waiting for their turn in `Serialized` mode. Further prompts are
/// dropped until the queue drains.
const TURN_QUEUE_CAPACITY: usize = 8;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// What the gateway did with one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The payload was not valid JSON. Nothing is sent.
    Rejected,
    /// A frame that needs no reply (setup, interrupt, error, unknown types).
    Ignored,
    /// A prompt was handed to the turn processor; one reply will follow.
    TurnQueued,
    /// A prompt arrived while the turn queue was full. No reply will follow.
    Dropped,
}

/// Server-side state of one relayed call.
///
/// Replies are pushed to `outbound`; whoever drains that channel is the only
/// writer to the socket. Closing the session cancels every turn still
/// waiting on the completion service.
pub struct Session {
    id: Uuid,
    responder: Arc<ResponseGenerator>,
    outbound: mpsc::Sender<OutboundFrame>,
    cancel: CancellationToken,
    /// Present in `Serialized` mode: prompts are answered in arrival order.
    turn_queue: Option<mpsc::Sender<Option<String>>>,
}

impl Session {
    /// Starts a session. No frame is emitted.
    pub fn open(
        id: Uuid,
        responder: Arc<ResponseGenerator>,
        ordering: TurnOrdering,
        outbound: mpsc::Sender<OutboundFrame>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let turn_queue = match ordering {
            TurnOrdering::Concurrent => None,
            TurnOrdering::Serialized => {
                let (tx, rx) = mpsc::channel(TURN_QUEUE_CAPACITY);
                tokio::spawn(
                    run_turn_queue(responder.clone(), rx, outbound.clone(), cancel.clone())
                        .in_current_span(),
                );
                Some(tx)
            }
        };
        info!(%id, ?ordering, "Client connected");

        Self {
            id,
            responder,
            outbound,
            cancel,
            turn_queue,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Decodes and dispatches one inbound message.
    ///
    /// Never fails: malformed input is logged and the session stays open.
    pub fn on_frame(&self, raw: &[u8]) -> Dispatch {
        let frame = match decode_frame(raw) {
            Ok(frame) => frame,
            Err(e) => {
                error!(
                    error = %e,
                    message = %String::from_utf8_lossy(raw),
                    "Error parsing message"
                );
                return Dispatch::Rejected;
            }
        };
        debug!(?frame, "Data");

        match frame {
            InboundFrame::Setup { call_sid } => {
                info!(call_sid = call_sid.as_deref().unwrap_or("unknown"), "Received setup");
                Dispatch::Ignored
            }
            InboundFrame::Prompt { voice_prompt } => {
                info!("Received prompt");
                self.start_turn(voice_prompt)
            }
            InboundFrame::Interrupt(payload) => {
                // Replies are generated whole, so there is nothing to cut short.
                warn!(%payload, "Received interruption");
                Dispatch::Ignored
            }
            InboundFrame::Error(payload) => {
                error!(%payload, "Received error");
                Dispatch::Ignored
            }
            InboundFrame::Unrecognized(payload) => {
                info!(%payload, "Received non-VoxRay event");
                Dispatch::Ignored
            }
        }
    }

    fn start_turn(&self, voice_prompt: Option<String>) -> Dispatch {
        match &self.turn_queue {
            Some(queue) => match queue.try_send(voice_prompt) {
                Ok(()) => Dispatch::TurnQueued,
                Err(TrySendError::Full(_)) => {
                    warn!(capacity = TURN_QUEUE_CAPACITY, "Turn queue is full; dropping prompt.");
                    Dispatch::Dropped
                }
                Err(TrySendError::Closed(_)) => {
                    warn!("Turn queue is closed; dropping prompt.");
                    Dispatch::Dropped
                }
            },
            None => {
                tokio::spawn(
                    answer(
                        self.responder.clone(),
                        voice_prompt,
                        self.outbound.clone(),
                        self.cancel.clone(),
                    )
                    .in_current_span(),
                );
                Dispatch::TurnQueued
            }
        }
    }

    /// Abandons in-flight turns. Nothing is written afterwards.
    pub fn close(&self) {
        self.cancel.cancel();
        info!("Client disconnected.");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Runs one turn and hands its reply to the writer, unless the session
/// closes first.
async fn answer(
    responder: Arc<ResponseGenerator>,
    voice_prompt: Option<String>,
    outbound: mpsc::Sender<OutboundFrame>,
    cancel: CancellationToken,
) {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => debug!("Connection closed; abandoning turn."),
        _ = async {
            let frame = process_turn(&responder, voice_prompt).await;
            if outbound.send(frame).await.is_err() {
                warn!("Connection writer is gone; reply dropped.");
            }
        } => {}
    }
}

/// Answers queued prompts one at a time, in arrival order.
async fn run_turn_queue(
    responder: Arc<ResponseGenerator>,
    mut turns: mpsc::Receiver<Option<String>>,
    outbound: mpsc::Sender<OutboundFrame>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = turns.recv() => match next {
                Some(voice_prompt) => {
                    answer(responder.clone(), voice_prompt, outbound.clone(), cancel.clone()).await
                }
                None => break,
            },
        }
    }
}

/// Main handler for an individual relay connection.
#[instrument(name = "ws_session", skip_all, fields(session_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id = Uuid::new_v4();
    tracing::Span::current().record("session_id", tracing::field::display(session_id));

    let (socket_tx, mut socket_rx) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
    let writer = tokio::spawn(write_outbound(socket_tx, outbound_rx).in_current_span());

    let session = Session::open(
        session_id,
        state.responder.clone(),
        state.config.turn_ordering,
        outbound_tx,
    );

    while let Some(msg_result) = socket_rx.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                session.on_frame(text.as_str().as_bytes());
            }
            Ok(Message::Binary(data)) => {
                session.on_frame(&data);
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Err(e) => {
                error!("Error receiving from relay WebSocket: {:?}", e);
                break;
            }
        }
    }

    session.close();
    writer.abort();
}

/// Drains replies onto the socket. The only task that writes to it.
async fn write_outbound(
    mut socket_tx: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<OutboundFrame>,
) {
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = send_msg(&mut socket_tx, &frame).await {
            error!(error = ?e, "Failed to send response; closing writer.");
            break;
        }
        info!(?frame, "Sent response");
    }
}

/// A helper function to serialize and send an `OutboundFrame` to the relay.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    frame: &OutboundFrame,
) -> Result<()> {
    let serialized = encode_frame(frame)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
