//! Wire payloads exchanged with the HTTP boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Incoming request for code execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ExecuteRequest {
    /// Session to run against; absent or empty starts a new session.
    #[serde(default)]
    pub id: Option<String>,
    /// Source text executed verbatim; absent means empty.
    #[serde(default)]
    pub code: String,
}

impl ExecuteRequest {
    /// Requested session id, with an empty string treated as absent.
    #[must_use]
    pub fn session_id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }
}

/// Execution result returned to the caller.
///
/// `id` is always present (empty only when session creation failed);
/// the remaining fields are omitted when empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ExecuteResponse {
    /// Resolved session id.
    #[serde(default)]
    pub id: String,
    /// Captured standard output.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stdout: String,
    /// Captured standard error.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stderr: String,
    /// Call-level failure description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl ExecuteResponse {
    /// Build a response that carries only an error message.
    #[must_use]
    pub fn failure(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            error: error.into(),
            ..Self::default()
        }
    }
}

/// Point-in-time view of a live session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SessionSummary {
    /// Session identifier.
    pub id: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Milliseconds since the last execution started.
    pub idle_ms: u64,
    /// Number of executions started on this session.
    pub executions: u64,
}
