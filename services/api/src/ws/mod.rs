//! Relay WebSocket Gateway
//!
//! This module contains the logic for one telephony relay connection per call.
//! It is structured into submodules:
//!
//! - `protocol`: Decodes and encodes the relay's JSON frames.
//! - `session`: Owns the connection, dispatches frames and writes replies.
//! - `turn`: Turns one caller utterance into one reply frame.

pub mod protocol;
pub mod session;
pub mod turn;

pub use session::ws_handler;
