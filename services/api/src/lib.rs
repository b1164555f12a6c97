//! Voxray API Library Crate
//!
//! This library contains all the logic for the voice relay bridge: the
//! configuration, the call-control webhook, the relay WebSocket gateway and
//! routing. The `api` binary is a thin wrapper around this library.

pub mod call_control;
pub mod config;
pub mod handlers;
pub mod router;
pub mod state;
pub mod ws;
