//! HTTP request boundary.

use std::sync::Arc;

use crate::config::GlobalConfig;
use crate::orchestrator::SessionRegistry;

pub mod handlers;
pub mod server;

/// Shared state handed to every request handler.
#[derive(Debug)]
pub struct AppState {
    /// Global configuration.
    pub config: Arc<GlobalConfig>,
    /// Live sessions.
    pub registry: Arc<SessionRegistry>,
}
