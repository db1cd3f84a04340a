use crate::operations::QueryOperation;
use crate::types::{PeerId, QueryKind};
use crate::{Peer, Result};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Keeps replicas honest across a peer's departure or unclean restart.
#[derive(Clone)]
pub struct PartitionOperation {
    peer: Arc<Peer>,
}

impl PartitionOperation {
    pub fn new(peer: Arc<Peer>) -> Self {
        Self { peer }
    }

    /// Handles the neighbor set of a departing peer.
    ///
    /// Peers it knew that this peer does not know directly are presumed cut
    /// off; every replica mastered by one of them is invalidated. Returns the
    /// invalidated filenames.
    pub async fn receive_neighbors(&self, remote: &BTreeSet<PeerId>) -> Vec<String> {
        let peer = &self.peer;
        let local = peer.neighbors.ids().await;
        let cut_off: BTreeSet<PeerId> = remote
            .difference(&local)
            .copied()
            .filter(|id| *id != peer.id())
            .collect();

        if cut_off.is_empty() {
            return Vec::new();
        }

        let invalidated = peer.entries.invalidate_mastered_by(&cut_off).await;
        for _ in &invalidated {
            peer.stats.record_invalidation();
        }

        tracing::info!(
            cut_off = ?cut_off,
            invalidated = invalidated.len(),
            "partition repair"
        );
        invalidated
    }

    /// Sends `target` an invalidation for every file this peer masters.
    ///
    /// Returns false if `target` dropped out along the way.
    pub async fn unregister_master_files(&self, target: PeerId) -> bool {
        let query = QueryOperation::new(self.peer.clone());
        for filename in self.peer.entries.master_files().await {
            query
                .originate(&filename, QueryKind::Invalidation, &[target])
                .await;
            if !self.peer.neighbors.is_connected(target).await {
                return false;
            }
        }
        true
    }

    /// Tells `target` which peers this one was connected to, ahead of leaving.
    pub async fn announce_departure(&self, target: PeerId) -> Result<()> {
        let peer = &self.peer;
        let neighbors = peer.neighbors.ids().await;
        let result = peer.transport.receive_neighbors(target, neighbors).await;
        peer.disconnect_on_failure(target, result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::FetchOperation;
    use crate::testing::LocalNetwork;
    use crate::types::{ConsistencyMode, Validity};

    #[tokio::test]
    async fn test_invalidates_only_the_asymmetric_difference() {
        // A=1 knows {B=2, C=3}; D=4 knows {B, C, E=5}.
        let network = LocalNetwork::new();
        let temp_dir = tempfile::tempdir().unwrap();
        let topology: [(PeerId, &[PeerId]); 5] = [
            (1, &[2, 3, 4]),
            (2, &[1, 4]),
            (3, &[1, 4]),
            (4, &[1, 2, 3, 5]),
            (5, &[4]),
        ];
        let mut peers = Vec::new();
        for (id, neighbors) in topology {
            peers.push(
                network
                    .open(network.config(&temp_dir, id, neighbors, ConsistencyMode::Push))
                    .await,
            );
        }
        network.join_all(&peers).await;
        network.add_master(&peers[1], "b.txt", b"b").await;
        network.add_master(&peers[2], "c.txt", b"c").await;
        network.add_master(&peers[4], "e.txt", b"e").await;

        let fetch = FetchOperation::new(peers[0].clone());
        for (source, filename) in [(2, "b.txt"), (3, "c.txt"), (5, "e.txt")] {
            fetch.run_from(source, filename).await.unwrap();
        }

        let invalidated = PartitionOperation::new(peers[0].clone())
            .receive_neighbors(&BTreeSet::from([1, 2, 3, 5]))
            .await;

        assert_eq!(invalidated, vec!["e.txt".to_string()]);
        let entries = peers[0].entries();
        assert_eq!(entries.has_file("b.txt").await, Validity::Valid);
        assert_eq!(entries.has_file("c.txt").await, Validity::Valid);
        assert_eq!(entries.has_file("e.txt").await, Validity::Invalid);
    }

    #[tokio::test]
    async fn test_unregister_invalidates_replicas_at_target() {
        let network = LocalNetwork::new();
        let temp_dir = tempfile::tempdir().unwrap();
        let master = network
            .open(network.config(&temp_dir, 1, &[2], ConsistencyMode::Push))
            .await;
        let cache = network
            .open(network.config(&temp_dir, 2, &[1], ConsistencyMode::Push))
            .await;
        network.join_all(&[master.clone(), cache.clone()]).await;
        network.add_master(&master, "a.txt", b"a").await;
        network.add_master(&master, "b.txt", b"b").await;
        let fetch = FetchOperation::new(cache.clone());
        fetch.run_from(1, "a.txt").await.unwrap();
        fetch.run_from(1, "b.txt").await.unwrap();

        let delivered = PartitionOperation::new(master.clone())
            .unregister_master_files(2)
            .await;

        assert!(delivered);
        assert_eq!(cache.entries().has_file("a.txt").await, Validity::Invalid);
        assert_eq!(cache.entries().has_file("b.txt").await, Validity::Invalid);
    }

    #[tokio::test]
    async fn test_departure_to_dead_neighbor_disconnects_it() {
        let network = LocalNetwork::new();
        let temp_dir = tempfile::tempdir().unwrap();
        let first = network
            .open(network.config(&temp_dir, 1, &[2], ConsistencyMode::Push))
            .await;
        let second = network
            .open(network.config(&temp_dir, 2, &[1], ConsistencyMode::Push))
            .await;
        network.join_all(&[first.clone(), second]).await;
        network.set_down(2, true);

        let operation = PartitionOperation::new(first.clone());
        assert!(operation.announce_departure(2).await.is_err());
        assert!(!first.neighbors().is_connected(2).await);
    }
}
