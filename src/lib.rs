#![forbid(unsafe_code)]

//! `session-exec` — stateful remote code execution.
//!
//! Clients submit snippets tagged with an optional session id; bindings
//! created by one submission are visible to later submissions under the
//! same id. Each call spawns a fresh interpreter that reloads the session's
//! last snapshot, runs the snippet, and writes a new snapshot.

pub mod config;
pub mod errors;
pub mod http;
pub mod models;
pub mod orchestrator;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
