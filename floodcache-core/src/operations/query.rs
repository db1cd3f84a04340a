use crate::operations::RevalidateOperation;
use crate::overlay::Admission;
use crate::storage::validate_filename;
use crate::types::{PeerId, QueryKind, QueryRequest, Validity};
use crate::{Peer, Result};
use futures_util::future::join_all;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Flooded search and invalidation queries, both the serving side and the
/// originating side.
#[derive(Clone)]
pub struct QueryOperation {
    peer: Arc<Peer>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOperationResult {
    /// Peers able to serve the file. Always empty for invalidations.
    pub sources: BTreeSet<PeerId>,
    pub forwarded_to: Vec<PeerId>,
    pub duplicate: bool,
}

impl QueryOperation {
    pub fn new(peer: Arc<Peer>) -> Self {
        Self { peer }
    }

    /// Serves a query received from `request.sender_id` and floods it onward.
    pub async fn run(&self, request: QueryRequest) -> Result<QueryOperationResult> {
        let QueryRequest {
            sender_id,
            filename,
            ttl,
            requesting_id,
            kind,
        } = request;
        validate_filename(&filename)?;

        let peer = &self.peer;
        peer.neighbors.connect(sender_id).await;

        let mut result = QueryOperationResult::default();
        if self.serve_locally(&filename, kind).await {
            result.sources.insert(peer.id());
        }

        let ttl = ttl.saturating_sub(1);
        let will_forward = ttl != 0;
        let admission = peer
            .dedup
            .admit(&filename, requesting_id, kind, will_forward)
            .await;

        match admission {
            Admission::Duplicate => {
                tracing::debug!(
                    filename = %filename,
                    requesting_id,
                    kind = %kind,
                    "duplicate query, not forwarding"
                );
                result.duplicate = true;
            }
            Admission::Ignored => {}
            Admission::Recorded => {
                let targets: Vec<PeerId> = peer
                    .neighbors
                    .connected()
                    .await
                    .into_iter()
                    .filter(|id| *id != sender_id && *id != requesting_id)
                    .collect();

                let forwarded = QueryRequest {
                    sender_id: peer.id(),
                    filename,
                    ttl,
                    requesting_id,
                    kind,
                };
                let found = self.forward(&targets, &forwarded).await;
                if kind == QueryKind::Search {
                    result.sources.extend(found);
                }
                result.forwarded_to = targets;
            }
        }

        if kind == QueryKind::Invalidation {
            result.sources.clear();
        }
        Ok(result)
    }

    /// Floods a search from this peer and returns every other peer holding a valid copy.
    pub async fn search(&self, filename: &str) -> Result<BTreeSet<PeerId>> {
        validate_filename(filename)?;

        let targets = self.peer.neighbors.connected().await;
        tracing::info!(filename = %filename, neighbors = targets.len(), "searching");

        let mut sources = self.originate(filename, QueryKind::Search, &targets).await;
        sources.remove(&self.peer.id());
        Ok(sources)
    }

    /// Sends a query with this peer as both sender and requester.
    pub(crate) async fn originate(
        &self,
        filename: &str,
        kind: QueryKind,
        targets: &[PeerId],
    ) -> BTreeSet<PeerId> {
        let request = QueryRequest {
            sender_id: self.peer.id(),
            filename: filename.to_string(),
            ttl: self.peer.config.ttl,
            requesting_id: self.peer.id(),
            kind,
        };
        self.forward(targets, &request).await
    }

    /// Evaluates the local copy. Returns true when this peer can serve the file.
    async fn serve_locally(&self, filename: &str, kind: QueryKind) -> bool {
        let peer = &self.peer;
        let validity = peer.entries.has_file(filename).await;

        match (validity, kind) {
            (Validity::Valid, QueryKind::Search) => {
                peer.stats.record_request(true);
                true
            }
            (Validity::TtrExpired, QueryKind::Search) => {
                peer.stats.record_request(false);
                RevalidateOperation::new(peer.clone())
                    .run(filename)
                    .await
                    .is_ok()
            }
            (Validity::Valid | Validity::TtrExpired, QueryKind::Invalidation) => {
                if peer.entries.invalidate(filename).await {
                    peer.stats.record_invalidation();
                    tracing::info!(filename = %filename, "cached copy invalidated");
                }
                false
            }
            (Validity::Invalid, _) => {
                peer.stats.record_request(false);
                false
            }
        }
    }

    async fn forward(&self, targets: &[PeerId], request: &QueryRequest) -> BTreeSet<PeerId> {
        let calls = targets.iter().map(|target| {
            let request = request.clone();
            async move {
                let result = self.peer.transport.query(*target, request).await;
                (*target, result)
            }
        });

        let mut sources = BTreeSet::new();
        for (target, result) in join_all(calls).await {
            match result {
                Ok(found) => sources.extend(found),
                Err(error) => {
                    tracing::warn!(
                        neighbor = target,
                        error = %error,
                        "query forward failed, disconnecting neighbor"
                    );
                    self.peer.neighbors.disconnect(target).await;
                }
            }
        }
        sources
    }
}
