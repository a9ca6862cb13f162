//! Session orchestration modules.
//!
//! Covers interpreter process running, state snapshots, per-session
//! execution, the session registry, and idle reclamation.

pub mod reclaim;
pub mod registry;
pub mod runner;
pub mod session;
pub mod snapshot;

pub use registry::SessionRegistry;
pub use runner::{RunOutput, Runner};
pub use session::{Execution, Session};
