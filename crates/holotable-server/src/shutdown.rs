//! Graceful shutdown via a shared `CancellationToken`.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How long background tasks get to finish once shutdown starts.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Owns the token that the HTTP server, sockets and heartbeat watch.
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a coordinator that has not fired.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// A clone of the shared token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Start shutdown. Idempotent.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has started.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait for Ctrl-C (or an earlier [`shutdown`](Self::shutdown)), then fire the token.
    pub async fn wait_for_signal(&self) {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    warn!(error = %e, "failed to listen for ctrl-c");
                } else {
                    info!("ctrl-c received");
                }
            }
            () = self.token.cancelled() => {}
        }
        self.shutdown();
    }

    /// Fire the token and wait up to `timeout` for `handles` to finish.
    pub async fn graceful_shutdown(&self, handles: Vec<JoinHandle<()>>, timeout: Option<Duration>) {
        let timeout = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);
        self.shutdown();
        info!(task_count = handles.len(), timeout_secs = timeout.as_secs(), "draining tasks");

        if tokio::time::timeout(timeout, futures::future::join_all(handles))
            .await
            .is_err()
        {
            warn!("shutdown timed out after {timeout:?}, abandoning remaining tasks");
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
