//! Periodic purge of expired sessions

use docsession_core::Sessions;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};

/// Handle for the background purge task
///
/// Dropping the handle aborts the task.
pub struct PurgeTask {
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl PurgeTask {
    /// Signal the purge task to stop and wait for it to finish
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = (&mut self.handle).await;
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for PurgeTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Spawn a task that purges expired sessions every `interval`
///
/// The first purge runs one full interval after spawning. Purge failures are
/// logged and the task keeps running.
///
/// Must be called from within a tokio runtime.
pub fn spawn_purge_task(sessions: Arc<Sessions>, interval: Duration) -> PurgeTask {
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

    let handle = tokio::spawn(async move {
        tracing::info!(
            "Starting purge task for {} (interval: {}s)",
            sessions.describe(),
            interval.as_secs()
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Purge task shutting down");
                    break;
                }
                _ = sleep(interval) => {
                    if let Err(e) = sessions.purge() {
                        tracing::error!("Purge task failed: {}", e);
                    }
                }
            }
        }
    });

    PurgeTask {
        shutdown_tx,
        handle,
    }
}
