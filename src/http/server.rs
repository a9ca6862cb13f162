//! axum router and listener for the execution boundary.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{handlers, AppState};
use crate::config::GlobalConfig;
use crate::{AppError, Result};

/// Build the HTTP router over shared state.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/execute", post(handlers::execute))
        .route("/health", get(handlers::health))
        .route("/sessions", get(handlers::list_sessions))
        .route("/sessions/{id}", delete(handlers::delete_session))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();
    let response = next.run(request).await;
    debug!(
        %method,
        path,
        status = response.status().as_u16(),
        elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        "request handled"
    );
    response
}

/// Bind the listener described by `config`.
///
/// # Errors
///
/// Returns `AppError::Config` for an invalid address, or `AppError::Http`
/// if the bind fails.
pub async fn bind(config: &GlobalConfig) -> Result<TcpListener> {
    let addr = config.bind_addr()?;
    TcpListener::bind(addr)
        .await
        .map_err(|err| AppError::Http(format!("failed to bind {addr}: {err}")))
}

/// Serve the execution boundary on `listener` until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Http` if the server fails.
pub async fn serve(listener: TcpListener, state: Arc<AppState>, ct: CancellationToken) -> Result<()> {
    let local = listener
        .local_addr()
        .map_err(|err| AppError::Http(format!("listener has no local address: {err}")))?;
    info!(%local, "starting HTTP execution boundary");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            ct.cancelled().await;
        })
        .await
        .map_err(|err| AppError::Http(format!("server error: {err}")))?;

    info!("HTTP execution boundary shut down");
    Ok(())
}
