//! Shared helpers for integration tests.
//!
//! Every test gets its own storage root under a `TempDir` so sessions from
//! different tests never share a directory. Executions use a real
//! `python3` from `PATH`.

use std::sync::Arc;
use std::time::Duration;

use session_exec::config::{GlobalConfig, InterpreterConfig};
use session_exec::http::{server, AppState};
use session_exec::orchestrator::{Execution, Runner, Session, SessionRegistry};
use tempfile::TempDir;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Generous deadline for calls that are expected to finish.
pub const RELAXED_MS: u64 = 10_000;

/// Deadline `ms` milliseconds from now.
pub fn deadline(ms: u64) -> Instant {
    Instant::now() + Duration::from_millis(ms)
}

/// Registry rooted in a fresh temp directory. Keep the `TempDir` alive for
/// the duration of the test.
pub fn test_registry() -> (Arc<SessionRegistry>, TempDir) {
    let temp = tempfile::tempdir().expect("tempdir");
    let registry = SessionRegistry::new(temp.path(), Runner::new(&InterpreterConfig::default()))
        .expect("registry");
    (Arc::new(registry), temp)
}

/// Run `code` on `session` with a relaxed deadline, expecting completion.
pub async fn run(session: &Session, code: &str) -> Execution {
    session
        .execute(code, deadline(RELAXED_MS))
        .await
        .expect("execution completes")
}

/// Configuration for an HTTP test server with the given execution deadline.
pub fn test_config(temp: &TempDir, execution_ms: u64) -> GlobalConfig {
    let toml = format!(
        r#"
http_port = 0
storage_root = '{root}'

[timeouts]
execution_ms = {execution_ms}
"#,
        root = temp.path().to_str().expect("utf8").replace('\\', "\\\\"),
    );
    GlobalConfig::from_toml_str(&toml).expect("valid test config")
}

/// Running HTTP server bound to an ephemeral port.
pub struct TestServer {
    /// Base URL, e.g. `http://127.0.0.1:43567`.
    pub base_url: String,
    /// Registry behind the server.
    pub registry: Arc<SessionRegistry>,
    ct: CancellationToken,
    _temp: TempDir,
}

impl TestServer {
    /// Start a server whose executions are bounded by `execution_ms`.
    pub async fn start(execution_ms: u64) -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = Arc::new(test_config(&temp, execution_ms));
        let registry = Arc::new(SessionRegistry::from_config(&config).expect("registry"));
        let listener = server::bind(&config).await.expect("bind ephemeral");
        let port = listener.local_addr().expect("local addr").port();

        let state = Arc::new(AppState {
            config,
            registry: Arc::clone(&registry),
        });
        let ct = CancellationToken::new();
        let server_ct = ct.clone();
        tokio::spawn(async move {
            let _ = server::serve(listener, state, server_ct).await;
        });

        Self {
            base_url: format!("http://127.0.0.1:{port}"),
            registry,
            ct,
            _temp: temp,
        }
    }

    /// URL for `path` on this server.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.ct.cancel();
    }
}
