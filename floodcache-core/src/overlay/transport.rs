use crate::error::Result;
use crate::types::{ConsistencyMode, FileMetadata, PeerId, QueryRequest};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeSet;

/// Outbound side of the overlay RPC surface, addressed by peer id.
///
/// Every call either reaches the target peer's service or fails with an
/// error for which `FloodError::is_unreachable` holds.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Downloads file bytes. `Ok(None)` means the target's copy vanished from disk.
    async fn obtain(&self, target: PeerId, filename: &str) -> Result<Option<Bytes>>;

    /// Announces `caller` to `target` and returns the target's consistency mode.
    async fn notify_connection(&self, target: PeerId, caller: PeerId) -> Result<ConsistencyMode>;

    /// Hands a flooded query to `target` and returns the sources it found.
    async fn query(&self, target: PeerId, request: QueryRequest) -> Result<BTreeSet<PeerId>>;

    async fn check_metadata(&self, target: PeerId, filename: &str) -> Result<FileMetadata>;

    /// Sends the caller's neighbor set ahead of its departure.
    async fn receive_neighbors(&self, target: PeerId, neighbors: BTreeSet<PeerId>) -> Result<()>;
}
