//! Domain model module declarations.

pub mod payload;

pub use payload::{ExecuteRequest, ExecuteResponse, SessionSummary};
