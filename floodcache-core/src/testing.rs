//! In-memory overlay for tests: peers call each other's operations directly.

use crate::config::PeerConfig;
use crate::error::{FloodError, Result};
use crate::operations::{
    JoinOperation, ObtainOperation, ObtainOperationOutcome, PartitionOperation, QueryOperation,
};
use crate::overlay::PeerTransport;
use crate::peer::Peer;
use crate::types::{ConsistencyMode, FileMetadata, PeerId, QueryRequest};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, Weak};

#[derive(Default)]
struct NetworkState {
    peers: Mutex<HashMap<PeerId, Weak<Peer>>>,
    down: Mutex<HashSet<PeerId>>,
    queries: Mutex<Vec<(PeerId, QueryRequest)>>,
}

#[derive(Clone, Default)]
pub(crate) struct LocalNetwork {
    state: Arc<NetworkState>,
}

impl LocalNetwork {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn transport(&self) -> Arc<dyn PeerTransport> {
        Arc::new(LocalTransport {
            state: self.state.clone(),
        })
    }

    pub(crate) fn config(
        &self,
        temp_dir: &tempfile::TempDir,
        peer_id: PeerId,
        neighbors: &[PeerId],
        mode: ConsistencyMode,
    ) -> PeerConfig {
        let root = temp_dir.path().join(format!("peer{}", peer_id));
        PeerConfig::new(
            peer_id,
            neighbors.to_vec(),
            mode,
            root.join("files"),
            root.join("downloads"),
        )
    }

    pub(crate) async fn open(&self, config: PeerConfig) -> Arc<Peer> {
        let peer = Peer::open(config, self.transport()).await.unwrap();
        self.state
            .peers
            .lock()
            .unwrap()
            .insert(peer.id(), Arc::downgrade(&peer));
        peer
    }

    pub(crate) async fn join_all(&self, peers: &[Arc<Peer>]) {
        for peer in peers {
            JoinOperation::new(peer.clone()).run().await.unwrap();
        }
    }

    /// Writes a master file on disk and registers it, as a startup scan would.
    pub(crate) async fn add_master(&self, peer: &Arc<Peer>, filename: &str, data: &[u8]) {
        std::fs::write(peer.files().files_dir().join(filename), data).unwrap();
        peer.entries().register_master(filename).await;
    }

    pub(crate) fn set_down(&self, peer_id: PeerId, down: bool) {
        let mut set = self.state.down.lock().unwrap();
        if down {
            set.insert(peer_id);
        } else {
            set.remove(&peer_id);
        }
    }

    /// Every query delivered so far, as (target, request).
    pub(crate) fn queries(&self) -> Vec<(PeerId, QueryRequest)> {
        self.state.queries.lock().unwrap().clone()
    }

    pub(crate) fn clear_queries(&self) {
        self.state.queries.lock().unwrap().clear();
    }
}

struct LocalTransport {
    state: Arc<NetworkState>,
}

impl LocalTransport {
    fn reach(&self, target: PeerId) -> Result<Arc<Peer>> {
        let unreachable = |reason: &str| FloodError::PeerUnreachable {
            peer_id: target,
            reason: reason.to_string(),
        };

        if self.state.down.lock().unwrap().contains(&target) {
            return Err(unreachable("peer is down"));
        }

        self.state
            .peers
            .lock()
            .unwrap()
            .get(&target)
            .and_then(Weak::upgrade)
            .ok_or_else(|| unreachable("no such peer"))
    }
}

#[async_trait]
impl PeerTransport for LocalTransport {
    async fn obtain(&self, target: PeerId, filename: &str) -> Result<Option<Bytes>> {
        let peer = self.reach(target)?;
        match ObtainOperation::new(peer).run(filename).await? {
            ObtainOperationOutcome::Found(data) => Ok(Some(data)),
            ObtainOperationOutcome::Vanished => Ok(None),
        }
    }

    async fn notify_connection(&self, target: PeerId, caller: PeerId) -> Result<ConsistencyMode> {
        let peer = self.reach(target)?;
        Ok(peer.notify_connection(caller).await)
    }

    async fn query(&self, target: PeerId, request: QueryRequest) -> Result<BTreeSet<PeerId>> {
        let peer = self.reach(target)?;
        self.state
            .queries
            .lock()
            .unwrap()
            .push((target, request.clone()));
        let result = QueryOperation::new(peer).run(request).await?;
        Ok(result.sources)
    }

    async fn check_metadata(&self, target: PeerId, filename: &str) -> Result<FileMetadata> {
        let peer = self.reach(target)?;
        peer.check_metadata(filename).await
    }

    async fn receive_neighbors(&self, target: PeerId, neighbors: BTreeSet<PeerId>) -> Result<()> {
        let peer = self.reach(target)?;
        PartitionOperation::new(peer)
            .receive_neighbors(&neighbors)
            .await;
        Ok(())
    }
}
