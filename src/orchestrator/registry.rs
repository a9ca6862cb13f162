//! Identifier-keyed store of live sessions.
//!
//! The map sits behind a `tokio::sync::RwLock`: lookups share the lock,
//! inserts and removals take it exclusively. Sessions are fully built
//! (storage area included) before they are inserted, so an id in the map
//! always refers to a live, initialized session. Storage removal happens
//! after the map lock is released.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use super::runner::Runner;
use super::session::Session;
use crate::config::GlobalConfig;
use crate::models::SessionSummary;
use crate::{AppError, Result};

/// Registry of live sessions sharing one storage root and interpreter.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    storage_root: PathBuf,
    runner: Arc<Runner>,
}

impl SessionRegistry {
    /// Create a registry rooted at `storage_root`, creating the directory
    /// if needed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the storage root cannot be created or
    /// resolved.
    pub fn new(storage_root: impl AsRef<Path>, runner: Runner) -> Result<Self> {
        let root = storage_root.as_ref();
        std::fs::create_dir_all(root).map_err(|err| {
            AppError::Io(format!(
                "failed to create storage root {}: {err}",
                root.display()
            ))
        })?;
        let storage_root = root.canonicalize().map_err(|err| {
            AppError::Io(format!(
                "failed to resolve storage root {}: {err}",
                root.display()
            ))
        })?;

        info!(storage_root = %storage_root.display(), interpreter = runner.program(), "session registry ready");

        Ok(Self {
            sessions: RwLock::new(HashMap::new()),
            storage_root,
            runner: Arc::new(runner),
        })
    }

    /// Build a registry from the global configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the configured storage root is unusable.
    pub fn from_config(config: &GlobalConfig) -> Result<Self> {
        Self::new(config.storage_root(), Runner::new(&config.interpreter))
    }

    /// Canonical storage root.
    #[must_use]
    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// Look up a live session without creating one.
    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions
            .read()
            .await
            .get(id)
            .filter(|session| session.is_alive())
            .map(Arc::clone)
    }

    /// Return the live session for `id`, or create and register a new one.
    ///
    /// An empty `id` always creates a session with a generated identifier.
    /// A non-empty `id` that is unknown (or whose session is gone) creates
    /// a fresh, stateless session under that id. Concurrent first uses of
    /// the same id resolve to a single session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SessionInit` if the storage area cannot be
    /// created; the registry is left unchanged.
    pub async fn get_or_create(&self, id: &str) -> Result<Arc<Session>> {
        if !id.is_empty() {
            if let Some(session) = self.get(id).await {
                return Ok(session);
            }
        }

        let requested = !id.is_empty();
        let session_id = if requested {
            id.to_owned()
        } else {
            Uuid::new_v4().to_string()
        };

        let fresh = Arc::new(Session::create(
            session_id.clone(),
            &self.storage_root,
            Arc::clone(&self.runner),
        )
        .await?);

        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(&session_id).filter(|s| s.is_alive()) {
            if requested {
                debug!(session_id, "lost creation race; reusing registered session");
                return Ok(Arc::clone(existing));
            }
            return Err(AppError::SessionInit(
                "generated session id collided with a live session".into(),
            ));
        }
        sessions.insert(session_id.clone(), Arc::clone(&fresh));
        drop(sessions);

        info!(session_id, "session created");
        Ok(fresh)
    }

    /// Number of registered sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no sessions are registered.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Summaries of all registered sessions, oldest first.
    pub async fn list(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> = self
            .sessions
            .read()
            .await
            .values()
            .map(|session| session.summary())
            .collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        summaries
    }

    /// Destroy the session registered under `id`.
    ///
    /// Returns `false` if no such session is registered. Waits for an
    /// in-flight execution on that session to finish before removing its
    /// storage.
    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id);
        let Some(session) = removed else {
            return false;
        };
        session.mark_dead();
        session
            .cleanup()
            .instrument(info_span!("remove_session", session_id = id))
            .await;
        true
    }

    /// Destroy every session idle for longer than `max_age`.
    ///
    /// Expired sessions are marked dead and unregistered under the write
    /// lock, so no new execution can begin on them. Storage is removed
    /// afterwards, each removal waiting for that session's in-flight
    /// execution to finish. Returns the number of sessions reclaimed.
    pub async fn reclaim_idle(&self, max_age: Duration) -> usize {
        let expired: Vec<Arc<Session>> = {
            let mut sessions = self.sessions.write().await;
            let ids: Vec<String> = sessions
                .iter()
                .filter(|(_, session)| session.idle_for() > max_age)
                .map(|(id, _)| id.clone())
                .collect();
            let expired: Vec<Arc<Session>> = ids
                .iter()
                .filter_map(|id| sessions.remove(id))
                .inspect(|session| {
                    session.mark_dead();
                })
                .collect();
            expired
        };

        for session in &expired {
            session
                .cleanup()
                .instrument(info_span!("reclaim_session", session_id = session.id()))
                .await;
        }

        if !expired.is_empty() {
            info!(count = expired.len(), "reclaimed idle sessions");
        }
        expired.len()
    }

    /// Destroy all sessions. Used on server shutdown.
    pub async fn shutdown(&self) {
        let drained: Vec<Arc<Session>> = {
            let mut sessions = self.sessions.write().await;
            let drained: Vec<Arc<Session>> = sessions.drain().map(|(_, session)| session).collect();
            drained
        };

        for session in &drained {
            session.cleanup().await;
        }
        info!(count = drained.len(), "session registry shut down");
    }
}
