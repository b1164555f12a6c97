//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the immutable
//! configuration and the services shared by every connection.

use crate::config::Config;
use std::sync::Arc;
use voxray_core::responder::ResponseGenerator;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub responder: Arc<ResponseGenerator>,
    pub config: Arc<Config>,
}
