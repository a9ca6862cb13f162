//! Request handlers for the execution boundary.
//!
//! Transport status codes only report transport problems: bodies that
//! are not a JSON request object get `400`, wrong methods `405` (from the
//! router). Every other outcome, user-code failures and timeouts included,
//! is a `200` with the detail in the `error`/`stderr` body fields.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tokio::time::Instant;
use tracing::{error, info_span, warn, Instrument};

use super::AppState;
use crate::models::{ExecuteRequest, ExecuteResponse, SessionSummary};
use crate::orchestrator::SessionRegistry;

/// Error text returned when a session cannot be created.
pub const SESSION_INIT_FAILED: &str = "failed to initialize session";

/// Error text returned when the execution deadline elapses.
pub const EXECUTION_TIMEOUT: &str = "execution timeout";

/// Error text returned for unparsable request bodies.
pub const INVALID_PAYLOAD: &str = "invalid request payload";

/// Handler for `GET /health` — returns 200 OK with a plain-text body.
pub async fn health() -> &'static str {
    "ok"
}

/// Handler for `POST /execute`.
///
/// The body is decoded as JSON whatever its `Content-Type`, so plain
/// `curl -d` submissions work.
pub async fn execute(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request = match serde_json::from_slice::<ExecuteRequest>(&body) {
        Ok(request) => request,
        Err(err) => {
            warn!(%err, "rejected execute payload");
            return (
                StatusCode::BAD_REQUEST,
                Json(ExecuteResponse::failure("", INVALID_PAYLOAD)),
            )
                .into_response();
        }
    };

    let deadline = Instant::now() + state.config.execution_timeout();
    Json(run_request(&state.registry, &request, deadline).await).into_response()
}

/// Resolve the session for `request`, execute its code, and encode the outcome.
pub async fn run_request(
    registry: &SessionRegistry,
    request: &ExecuteRequest,
    deadline: Instant,
) -> ExecuteResponse {
    let session = match registry.get_or_create(request.session_id()).await {
        Ok(session) => session,
        Err(err) => {
            error!(%err, "session initialization failed");
            return ExecuteResponse::failure("", SESSION_INIT_FAILED);
        }
    };

    let id = session.id().to_owned();
    let span = info_span!("execute", session_id = %id);
    match session.execute(&request.code, deadline).instrument(span).await {
        Ok(execution) => ExecuteResponse {
            id,
            stdout: execution.stdout,
            stderr: execution.stderr,
            error: String::new(),
        },
        Err(err) if err.is_timeout() => {
            warn!(session_id = %id, %err, "execution timed out");
            ExecuteResponse::failure(id, EXECUTION_TIMEOUT)
        }
        Err(err) => {
            warn!(session_id = %id, %err, "execution failed");
            ExecuteResponse::failure(id, err.to_string())
        }
    }
}

/// Handler for `GET /sessions`.
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<Vec<SessionSummary>> {
    Json(state.registry.list().await)
}

/// Handler for `DELETE /sessions/{id}`.
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> StatusCode {
    if state.registry.remove(&id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
