//! Group registry: which sockets are live in which group, and fan-out to them.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use metrics::counter;
use tracing::{debug, warn};

use super::connection::ClientConnection;
use crate::metrics::WS_BROADCAST_DROPS_TOTAL;

/// Lifetime drops after which a slow client is removed from its group and
/// its session told to close.
pub const MAX_TOTAL_DROPS: u64 = 100;

/// Result of one group broadcast.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Sockets registered in the group when the broadcast started.
    pub recipients: usize,
    /// Sockets whose queue accepted the frame.
    pub delivered: usize,
    /// Sockets whose queue was full or closed.
    pub failed: usize,
}

/// Live sockets keyed by group name.
///
/// A group's entry exists only while it has at least one socket.
pub struct GroupRegistry {
    groups: DashMap<String, Vec<Arc<ClientConnection>>>,
    active_count: AtomicUsize,
}

impl GroupRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            groups: DashMap::new(),
            active_count: AtomicUsize::new(0),
        }
    }

    /// Register a socket under its group, creating the group on first use.
    pub fn connect(&self, connection: Arc<ClientConnection>) {
        let group = connection.group_name.clone();
        debug!(group, client = %connection.client_name, conn_id = %connection.id, "socket joined group");
        self.groups.entry(group).or_default().push(connection);
        let _ = self.active_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Remove a socket. Drops the group entry once it is empty.
    ///
    /// Returns `false` if the socket was not registered (already evicted).
    pub fn disconnect(&self, connection: &ClientConnection) -> bool {
        self.remove(&connection.group_name, &connection.id)
    }

    fn remove(&self, group: &str, connection_id: &str) -> bool {
        let removed = match self.groups.get_mut(group) {
            Some(mut conns) => {
                let before = conns.len();
                conns.retain(|c| c.id != connection_id);
                conns.len() != before
            }
            None => false,
        };
        let _ = self.groups.remove_if(group, |_, conns| conns.is_empty());
        if removed {
            let _ = self.active_count.fetch_sub(1, Ordering::Relaxed);
        }
        removed
    }

    /// Send `message` to every socket currently in `group`.
    ///
    /// A full or closed queue only affects that socket. Sockets that reach
    /// [`MAX_TOTAL_DROPS`] are removed afterwards. An unknown group is a no-op.
    pub fn broadcast(&self, group: &str, message: &str) -> BroadcastReport {
        let Some(snapshot) = self.groups.get(group).map(|conns| conns.value().clone()) else {
            debug!(group, "broadcast to empty group");
            return BroadcastReport::default();
        };

        let frame = Arc::new(message.to_owned());
        let mut report = BroadcastReport {
            recipients: snapshot.len(),
            ..BroadcastReport::default()
        };
        let mut to_remove = Vec::new();
        for conn in &snapshot {
            if conn.send(Arc::clone(&frame)) {
                report.delivered += 1;
                continue;
            }
            report.failed += 1;
            counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
            let drops = conn.drop_count();
            if drops >= MAX_TOTAL_DROPS {
                warn!(conn_id = %conn.id, group, drops, "disconnecting slow client");
                to_remove.push(Arc::clone(conn));
            } else {
                warn!(conn_id = %conn.id, group, total_drops = drops, "failed to enqueue frame");
            }
        }
        for conn in &to_remove {
            let _ = self.remove(group, &conn.id);
            conn.request_close();
        }
        debug!(group, recipients = report.recipients, failed = report.failed, "broadcast");
        report
    }

    /// Send `message` to one socket.
    pub fn send_direct(&self, connection: &ClientConnection, message: &str) -> bool {
        connection.send_text(message)
    }

    /// Sockets currently in `group`.
    pub fn members(&self, group: &str) -> Vec<Arc<ClientConnection>> {
        self.groups
            .get(group)
            .map(|conns| conns.value().clone())
            .unwrap_or_default()
    }

    /// `(group, socket count)` for every live group, sorted by name.
    pub fn group_sizes(&self) -> Vec<(String, usize)> {
        let mut sizes: Vec<_> = self
            .groups
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().len()))
            .collect();
        sizes.sort();
        sizes
    }

    /// Total live sockets.
    pub fn connection_count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }

    /// Number of groups with at least one socket.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

impl Default for GroupRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn socket(
        client: &str,
        group: &str,
        capacity: usize,
    ) -> (Arc<ClientConnection>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Arc::new(ClientConnection::new(client, group, tx)), rx)
    }

    #[test]
    fn empty_registry() {
        let registry = GroupRegistry::new();
        assert_eq!(registry.connection_count(), 0);
        assert_eq!(registry.group_count(), 0);
        assert_eq!(registry.broadcast("rebels", "hi"), BroadcastReport::default());
    }

    #[tokio::test]
    async fn broadcast_reaches_only_its_group() {
        let registry = GroupRegistry::new();
        let (luke, mut luke_rx) = socket("luke", "rebels", 8);
        let (leia, mut leia_rx) = socket("leia", "rebels", 8);
        let (vader, mut vader_rx) = socket("vader", "empire", 8);
        registry.connect(luke);
        registry.connect(leia);
        registry.connect(vader);

        let report = registry.broadcast("rebels", "hello rebels");
        assert_eq!(
            report,
            BroadcastReport {
                recipients: 2,
                delivered: 2,
                failed: 0
            }
        );
        assert_eq!(&*luke_rx.recv().await.unwrap(), "hello rebels");
        assert_eq!(&*leia_rx.recv().await.unwrap(), "hello rebels");
        assert!(vader_rx.try_recv().is_err());
    }

    #[test]
    fn disconnect_drops_empty_group() {
        let registry = GroupRegistry::new();
        let (luke, _rx) = socket("luke", "rebels", 8);
        registry.connect(Arc::clone(&luke));
        assert_eq!(registry.group_count(), 1);

        assert!(registry.disconnect(&luke));
        assert_eq!(registry.group_count(), 0);
        assert_eq!(registry.connection_count(), 0);
        assert!(!registry.disconnect(&luke));
    }

    #[test]
    fn disconnect_keeps_group_with_members() {
        let registry = GroupRegistry::new();
        let (luke, _r1) = socket("luke", "rebels", 8);
        let (leia, _r2) = socket("leia", "rebels", 8);
        registry.connect(Arc::clone(&luke));
        registry.connect(leia);

        assert!(registry.disconnect(&luke));
        assert_eq!(registry.group_sizes(), vec![("rebels".to_string(), 1)]);
        assert_eq!(registry.members("rebels")[0].client_name, "leia");
    }

    #[tokio::test]
    async fn failed_socket_does_not_block_siblings() {
        let registry = GroupRegistry::new();
        let (dead, dead_rx) = socket("dead", "rebels", 8);
        let (live, mut live_rx) = socket("live", "rebels", 8);
        drop(dead_rx);
        registry.connect(dead);
        registry.connect(live);

        let report = registry.broadcast("rebels", "still here");
        assert_eq!(report.recipients, 2);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(&*live_rx.recv().await.unwrap(), "still here");
    }

    #[test]
    fn slow_client_evicted_after_drop_limit() {
        let registry = GroupRegistry::new();
        let (slow, _rx) = socket("slow", "rebels", 1);
        registry.connect(Arc::clone(&slow));

        // first frame fills the queue, the rest are drops
        for _ in 0..=MAX_TOTAL_DROPS {
            let _ = registry.broadcast("rebels", "tick");
        }
        assert_eq!(registry.connection_count(), 0);
        assert_eq!(registry.group_count(), 0);
        assert!(slow.close_requested());
    }

    #[tokio::test]
    async fn evicted_client_is_told_to_close() {
        let registry = GroupRegistry::new();
        let (slow, mut slow_rx) = socket("slow", "rebels", 1);
        let (fast, _fast_rx) = socket("fast", "rebels", 256);
        registry.connect(Arc::clone(&slow));
        registry.connect(Arc::clone(&fast));

        for _ in 0..=MAX_TOTAL_DROPS {
            let _ = registry.broadcast("rebels", "tick");
        }
        // draining the queue afterwards does not bring the socket back
        while slow_rx.try_recv().is_ok() {}
        let report = registry.broadcast("rebels", "after");
        assert_eq!(report.recipients, 1);

        tokio::time::timeout(std::time::Duration::from_secs(1), slow.closed())
            .await
            .unwrap();
        assert!(!fast.close_requested());
        assert_eq!(registry.members("rebels")[0].client_name, "fast");
    }

    #[tokio::test]
    async fn send_direct_targets_one_socket() {
        let registry = GroupRegistry::new();
        let (luke, mut luke_rx) = socket("luke", "rebels", 8);
        let (leia, mut leia_rx) = socket("leia", "rebels", 8);
        registry.connect(Arc::clone(&luke));
        registry.connect(leia);

        assert!(registry.send_direct(&luke, "just you"));
        assert_eq!(&*luke_rx.recv().await.unwrap(), "just you");
        assert!(leia_rx.try_recv().is_err());
    }

    #[test]
    fn group_sizes_sorted_by_name() {
        let registry = GroupRegistry::new();
        let (a, _r1) = socket("a", "rebels", 1);
        let (b, _r2) = socket("b", "empire", 1);
        let (c, _r3) = socket("c", "empire", 1);
        registry.connect(a);
        registry.connect(b);
        registry.connect(c);
        assert_eq!(
            registry.group_sizes(),
            vec![("empire".to_string(), 2), ("rebels".to_string(), 1)]
        );
        assert_eq!(registry.connection_count(), 3);
    }
}
