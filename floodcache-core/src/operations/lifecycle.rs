use crate::operations::PartitionOperation;
use crate::types::{ConsistencyMode, PeerId};
use crate::{FloodError, Peer, Result};
use std::sync::Arc;

/// Startup handshake with configured neighbors.
#[derive(Clone)]
pub struct JoinOperation {
    peer: Arc<Peer>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinOperationResult {
    pub connected: Vec<PeerId>,
    pub unreachable: Vec<PeerId>,
}

impl JoinOperation {
    pub fn new(peer: Arc<Peer>) -> Self {
        Self { peer }
    }

    /// Greets every known neighbor. A neighbor running the other consistency
    /// mode is fatal: the whole overlay must agree on one.
    pub async fn run(&self) -> Result<JoinOperationResult> {
        let peer = &self.peer;
        let mut result = JoinOperationResult::default();

        for neighbor in peer.neighbors.ids().await {
            let remote = match peer.transport.notify_connection(neighbor, peer.id()).await {
                Ok(mode) => mode,
                Err(error) => {
                    tracing::info!(neighbor, error = %error, "neighbor not reachable yet");
                    peer.neighbors.disconnect(neighbor).await;
                    result.unreachable.push(neighbor);
                    continue;
                }
            };

            if remote != peer.mode() {
                tracing::error!(
                    neighbor,
                    local = %peer.mode(),
                    remote = %remote,
                    "consistency modes are not compatible"
                );
                return Err(FloodError::ModeMismatch {
                    peer_id: neighbor,
                    local: peer.mode(),
                    remote,
                });
            }

            peer.neighbors.connect(neighbor).await;
            result.connected.push(neighbor);

            // Replicas of our files may predate an unclean shutdown.
            if peer.mode() == ConsistencyMode::Push {
                PartitionOperation::new(peer.clone())
                    .unregister_master_files(neighbor)
                    .await;
            }
        }

        peer.arm_scheduler();

        tracing::info!(
            peer_id = peer.id(),
            connected = ?result.connected,
            unreachable = ?result.unreachable,
            "joined overlay"
        );
        Ok(result)
    }
}

/// Orderly departure from the overlay.
#[derive(Clone)]
pub struct ShutdownOperation {
    peer: Arc<Peer>,
}

impl ShutdownOperation {
    pub fn new(peer: Arc<Peer>) -> Self {
        Self { peer }
    }

    pub async fn run(&self) {
        let peer = &self.peer;

        if peer.mode() == ConsistencyMode::Push {
            let partition = PartitionOperation::new(peer.clone());
            for neighbor in peer.neighbors.connected().await {
                tracing::info!(neighbor, "unregistering master files");
                if !partition.unregister_master_files(neighbor).await {
                    continue;
                }
                if let Err(error) = partition.announce_departure(neighbor).await {
                    tracing::warn!(neighbor, error = %error, "departure notice failed");
                }
            }
        }

        peer.dedup.shutdown().await;
        peer.scheduler.shutdown();
        peer.stats.log_summary(peer.id());
    }
}
