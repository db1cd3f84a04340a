use crate::types::PeerId;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;

/// Adjacency list of this peer: neighbor id -> connected.
pub struct NeighborTable {
    local_id: PeerId,
    entries: RwLock<BTreeMap<PeerId, bool>>,
}

impl NeighborTable {
    /// Configured neighbors start disconnected until a handshake succeeds.
    pub fn new(local_id: PeerId, configured: &[PeerId]) -> Self {
        let entries = configured
            .iter()
            .copied()
            .filter(|id| *id != local_id)
            .map(|id| (id, false))
            .collect();

        Self {
            local_id,
            entries: RwLock::new(entries),
        }
    }

    /// Marks a peer connected, adding it if it was not known yet.
    pub async fn connect(&self, id: PeerId) {
        if id == self.local_id {
            return;
        }
        let previous = self.entries.write().await.insert(id, true);
        if previous != Some(true) {
            tracing::info!(neighbor = id, "neighbor connected");
        }
    }

    pub async fn disconnect(&self, id: PeerId) {
        if let Some(connected) = self.entries.write().await.get_mut(&id) {
            if *connected {
                tracing::info!(neighbor = id, "neighbor disconnected");
            }
            *connected = false;
        }
    }

    pub async fn is_connected(&self, id: PeerId) -> bool {
        self.entries
            .read()
            .await
            .get(&id)
            .copied()
            .unwrap_or(false)
    }

    pub async fn snapshot(&self) -> Vec<(PeerId, bool)> {
        self.entries
            .read()
            .await
            .iter()
            .map(|(id, connected)| (*id, *connected))
            .collect()
    }

    pub async fn connected(&self) -> Vec<PeerId> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|(_, connected)| **connected)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Every known neighbor id, connected or not.
    pub async fn ids(&self) -> BTreeSet<PeerId> {
        self.entries.read().await.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_disconnect() {
        let table = NeighborTable::new(1, &[2, 3, 1]);
        assert_eq!(table.snapshot().await, vec![(2, false), (3, false)]);

        table.connect(2).await;
        table.connect(1).await;
        assert!(table.is_connected(2).await);
        assert_eq!(table.connected().await, vec![2]);

        table.disconnect(2).await;
        assert!(!table.is_connected(2).await);
        assert!(table.connected().await.is_empty());
    }

    #[tokio::test]
    async fn test_inbound_contact_adds_unknown_peer() {
        let table = NeighborTable::new(1, &[2]);
        table.connect(7).await;

        assert_eq!(table.ids().await, BTreeSet::from([2, 7]));
        assert_eq!(table.connected().await, vec![7]);
    }

    #[tokio::test]
    async fn test_disconnect_unknown_is_noop() {
        let table = NeighborTable::new(1, &[2]);
        table.disconnect(9).await;
        assert_eq!(table.ids().await, BTreeSet::from([2]));
    }
}
