//! Per-socket connection handle shared between the session task and the registry.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One live WebSocket in one group.
///
/// Holds the sending half of the socket's outbound queue; the socket's writer
/// task owns the receiving half.
pub struct ClientConnection {
    /// Unique connection id.
    pub id: String,
    /// Client identity from the connection path.
    pub client_name: String,
    /// Group the socket joined.
    pub group_name: String,
    tx: mpsc::Sender<Arc<String>>,
    /// When the socket was accepted.
    pub connected_at: Instant,
    is_alive: AtomicBool,
    last_pong: Mutex<Instant>,
    dropped_messages: AtomicU64,
    close: CancellationToken,
}

impl ClientConnection {
    /// Create a handle with a fresh id.
    pub fn new(
        client_name: impl Into<String>,
        group_name: impl Into<String>,
        tx: mpsc::Sender<Arc<String>>,
    ) -> Self {
        let now = Instant::now();
        Self {
            id: format!("conn_{}", uuid::Uuid::now_v7()),
            client_name: client_name.into(),
            group_name: group_name.into(),
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
            close: CancellationToken::new(),
        }
    }

    /// Enqueue a text frame without waiting.
    ///
    /// Returns `false` when the queue is full or the writer is gone; the
    /// drop counter is incremented in that case.
    pub fn send(&self, message: Arc<String>) -> bool {
        if self.tx.try_send(message).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Enqueue an owned string.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.send(Arc::new(text.into()))
    }

    /// Lifetime count of frames that could not be enqueued.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Whether the writer side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Ask the session to end this socket.
    pub fn request_close(&self) {
        self.close.cancel();
    }

    /// Whether [`request_close`](Self::request_close) was called.
    pub fn close_requested(&self) -> bool {
        self.close.is_cancelled()
    }

    /// Resolves once a close has been requested.
    pub async fn closed(&self) {
        self.close.cancelled().await;
    }

    /// Record a Pong (or any other sign of life).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Time since the last sign of life.
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Read and clear the alive flag. `true` if the client answered since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("client_name", &self.client_name)
            .field("group_name", &self.group_name)
            .field("dropped_messages", &self.drop_count())
            .finish_non_exhaustive()
    }
}
