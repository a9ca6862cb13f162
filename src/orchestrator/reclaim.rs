//! Background idle-session reclamation.
//!
//! Runs as a background task sweeping the registry on a fixed interval and
//! destroying sessions unused for longer than the retention window.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::registry::SessionRegistry;

/// Spawn the idle-reclamation background task.
///
/// Every `interval` the task reclaims sessions idle for longer than
/// `max_age`. It exits when `cancel` fires.
#[must_use]
pub fn spawn_reclaim_task(
    registry: Arc<SessionRegistry>,
    interval: Duration,
    max_age: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately; nothing can be idle yet.
        ticker.tick().await;
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("reclaim task shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let reclaimed = registry.reclaim_idle(max_age).await;
                    debug!(reclaimed, "idle sweep completed");
                }
            }
        }
    })
}
