//! A single stateful execution context.
//!
//! Each session owns a private storage area (a temp directory under the
//! registry's storage root) holding its latest snapshot. The storage handle
//! sits behind a `tokio::sync::Mutex` that doubles as the execution lock:
//! reload, run, and snapshot happen while it is held, so calls on the same
//! session never overlap. `last_used` and `alive` live outside that lock so
//! the idle sweep can inspect a session while it is busy.
//!
//! Filesystem setup and teardown run on the blocking pool; the recursive
//! delete in particular walks whatever the user's code left behind.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tempfile::TempDir;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::runner::Runner;
use super::snapshot;
use crate::models::SessionSummary;
use crate::{AppError, Result};

/// File name of the composed script inside a session's storage area.
const SCRIPT_FILE: &str = "exec.py";

/// Output of an execution whose interpreter ran to completion.
///
/// A non-empty `stderr` means the user's code failed; the call itself
/// still succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Interpreter exit code, if it exited normally.
    pub exit_code: Option<i32>,
}

/// Stateful execution context identified by `id`.
#[derive(Debug)]
pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    runner: Arc<Runner>,
    alive: AtomicBool,
    executions: AtomicU64,
    last_used: std::sync::Mutex<Instant>,
    storage: Mutex<Option<TempDir>>,
}

impl Session {
    /// Create a session with a fresh storage area under `storage_root`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SessionInit` if the storage area or its initial
    /// snapshot cannot be created.
    pub async fn create(id: String, storage_root: &Path, runner: Arc<Runner>) -> Result<Self> {
        let root = storage_root.to_path_buf();
        let storage = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new().prefix("session-").tempdir_in(root)
        })
        .await
        .map_err(|err| AppError::SessionInit(format!("storage task panicked: {err}")))?
        .map_err(|err| {
            AppError::SessionInit(format!("failed to create session directory: {err}"))
        })?;

        tokio::fs::write(storage.path().join(snapshot::SNAPSHOT_FILE), b"")
            .await
            .map_err(|err| {
                AppError::SessionInit(format!("failed to initialize session state: {err}"))
            })?;

        debug!(session_id = %id, path = %storage.path().display(), "session storage created");

        Ok(Self {
            id,
            created_at: Utc::now(),
            runner,
            alive: AtomicBool::new(true),
            executions: AtomicU64::new(0),
            last_used: std::sync::Mutex::new(Instant::now()),
            storage: Mutex::new(Some(storage)),
        })
    }

    /// Session identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether the session still accepts executions.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Number of executions started on this session.
    #[must_use]
    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::Relaxed)
    }

    /// Time since the most recent execution started (or since creation).
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.last_used
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .elapsed()
    }

    /// Path of the storage area, or `None` once the session is destroyed.
    ///
    /// Waits for any in-flight execution to finish.
    pub async fn storage_path(&self) -> Option<PathBuf> {
        self.storage
            .lock()
            .await
            .as_ref()
            .map(|dir| dir.path().to_path_buf())
    }

    /// Point-in-time summary for listings.
    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            created_at: self.created_at,
            idle_ms: u64::try_from(self.idle_for().as_millis()).unwrap_or(u64::MAX),
            executions: self.executions(),
        }
    }

    /// Run `code` against this session's accumulated state.
    ///
    /// Waits for the execution lock, reloads the last snapshot, and runs
    /// the code. The snapshot the interpreter stages is committed only if
    /// it exits cleanly before `deadline`. Stdout and
    /// stderr are returned as captured; a non-zero exit with diagnostics on
    /// stderr is a user-code failure and still returns `Ok`.
    ///
    /// # Errors
    ///
    /// - `AppError::SessionGone` if the session has been destroyed.
    /// - `AppError::Timeout` if `deadline` elapses; no output is returned
    ///   and the previous snapshot is left untouched.
    /// - `AppError::Runner` if the interpreter cannot be started, or exits
    ///   unsuccessfully without writing anything to stderr.
    pub async fn execute(&self, code: &str, deadline: Instant) -> Result<Execution> {
        let guard = self.storage.lock().await;
        let storage = match guard.as_ref() {
            Some(dir) if self.is_alive() => dir,
            _ => {
                return Err(AppError::SessionGone(format!(
                    "session {} is no longer running",
                    self.id
                )))
            }
        };

        self.touch();
        let sequence = self.executions.fetch_add(1, Ordering::Relaxed) + 1;

        let snapshot_path = storage.path().join(snapshot::SNAPSHOT_FILE);
        let staging_path = storage.path().join(snapshot::STAGING_FILE);
        let script_path = storage.path().join(SCRIPT_FILE);

        snapshot::discard(&staging_path).await;
        let bindings = snapshot::load(&snapshot_path).await;
        let script = snapshot::compose_script(&bindings, code, &staging_path);
        tokio::fs::write(&script_path, script)
            .await
            .map_err(|err| AppError::Runner(format!("failed to write execution script: {err}")))?;

        debug!(
            session_id = %self.id,
            sequence,
            restored = bindings.len(),
            "running snippet"
        );

        let result = self
            .runner
            .run(&script_path, storage.path(), deadline)
            .await;

        if let Err(err) = tokio::fs::remove_file(&script_path).await {
            debug!(session_id = %self.id, %err, "failed to remove execution script");
        }

        // Only a run that beat its deadline and exited cleanly advances state.
        let output = match result {
            Ok(output) if output.success() => {
                snapshot::commit(&staging_path, &snapshot_path).await;
                output
            }
            Ok(output) => {
                snapshot::discard(&staging_path).await;
                output
            }
            Err(err) => {
                snapshot::discard(&staging_path).await;
                return Err(err);
            }
        };

        if !output.success() && output.stderr.trim().is_empty() {
            return Err(AppError::Runner(format!(
                "interpreter exited with {} and no diagnostics",
                output.status
            )));
        }

        Ok(Execution {
            exit_code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    /// Mark the session dead and remove its storage area.
    ///
    /// Idempotent. Waits for an in-flight execution to release the
    /// execution lock before deleting anything.
    pub async fn cleanup(&self) {
        self.mark_dead();
        let mut guard = self.storage.lock().await;
        let Some(storage) = guard.take() else {
            return;
        };

        let path = storage.path().to_path_buf();
        let removal = tokio::task::spawn_blocking(move || storage.close())
            .await
            .unwrap_or_else(|err| Err(std::io::Error::other(err)));
        match removal {
            Ok(()) => info!(session_id = %self.id, "session storage removed"),
            Err(err) => warn!(
                session_id = %self.id,
                path = %path.display(),
                %err,
                "failed to remove session storage"
            ),
        }
    }

    /// Flag the session as gone without touching storage.
    ///
    /// Returns whether the session was alive before the call.
    pub(crate) fn mark_dead(&self) -> bool {
        self.alive.swap(false, Ordering::SeqCst)
    }

    fn touch(&self) {
        *self
            .last_used
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Instant::now();
    }
}
