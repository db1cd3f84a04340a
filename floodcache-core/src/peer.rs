use crate::config::PeerConfig;
use crate::error::{FloodError, Result};
use crate::overlay::{DedupRegistry, NeighborTable, PeerTransport};
use crate::scheduler::RevalidationScheduler;
use crate::stats::PeerStats;
use crate::storage::{EntryStore, FileStore};
use crate::types::{ConsistencyMode, FileMetadata, PeerId};
use std::sync::Arc;

/// One overlay participant: its tables, its timers and its way out to other peers.
///
/// Every RPC of the overlay service and every client-side action is an
/// operation over this shared state; see `crate::operations`.
pub struct Peer {
    pub(crate) config: PeerConfig,
    pub(crate) entries: Arc<EntryStore>,
    pub(crate) neighbors: NeighborTable,
    pub(crate) dedup: DedupRegistry,
    pub(crate) files: FileStore,
    pub(crate) transport: Arc<dyn PeerTransport>,
    pub(crate) scheduler: RevalidationScheduler,
    pub(crate) stats: Arc<PeerStats>,
}

impl Peer {
    /// Builds a peer and loads what is already on disk.
    ///
    /// Files in the master directory become masters at version 0. Files in the
    /// downloads directory become INVALID replicas with no known master, since
    /// updates may have been missed while the peer was down.
    pub async fn open(config: PeerConfig, transport: Arc<dyn PeerTransport>) -> Result<Arc<Self>> {
        config.validate()?;

        let files = FileStore::new(config.files_dir.clone(), config.downloads_dir.clone())?;
        let entries = Arc::new(EntryStore::new(config.peer_id, config.ttr));
        let stats = Arc::new(PeerStats::new());

        let inventory = files.scan().await?;
        for filename in &inventory.masters {
            entries.register_master(filename).await;
        }
        for filename in &inventory.downloads {
            if entries.is_master(filename).await {
                tracing::warn!(
                    filename = %filename,
                    "replica shadows a master file, keeping the master"
                );
                continue;
            }
            entries.register_orphan(filename).await?;
        }

        tracing::info!(
            peer_id = config.peer_id,
            mode = %config.mode,
            masters = inventory.masters.len(),
            replicas = inventory.downloads.len(),
            "peer opened"
        );

        Ok(Arc::new(Self {
            neighbors: NeighborTable::new(config.peer_id, &config.neighbors),
            dedup: DedupRegistry::new(config.dedup_window, config.dedup_capacity),
            scheduler: RevalidationScheduler::new(
                entries.clone(),
                stats.clone(),
                config.max_scheduler_instances,
            ),
            config,
            entries,
            files,
            transport,
            stats,
        }))
    }

    pub fn id(&self) -> PeerId {
        self.config.peer_id
    }

    pub fn mode(&self) -> ConsistencyMode {
        self.config.mode
    }

    pub fn config(&self) -> &PeerConfig {
        &self.config
    }

    pub fn entries(&self) -> &EntryStore {
        &self.entries
    }

    pub fn neighbors(&self) -> &NeighborTable {
        &self.neighbors
    }

    pub fn dedup(&self) -> &DedupRegistry {
        &self.dedup
    }

    pub fn files(&self) -> &FileStore {
        &self.files
    }

    pub fn scheduler(&self) -> &RevalidationScheduler {
        &self.scheduler
    }

    pub fn stats(&self) -> &PeerStats {
        &self.stats
    }

    /// Handshake from a neighbor: it is connected from now on, and learns our mode.
    pub async fn notify_connection(&self, caller: PeerId) -> ConsistencyMode {
        self.neighbors.connect(caller).await;
        self.config.mode
    }

    pub async fn check_metadata(&self, filename: &str) -> Result<FileMetadata> {
        self.entries
            .metadata(filename)
            .await
            .ok_or_else(|| FloodError::FileNotFound(filename.to_string()))
    }

    /// Arms a revalidation chain when running in pull mode.
    pub(crate) fn arm_scheduler(&self) {
        if self.config.mode == ConsistencyMode::Pull {
            self.scheduler.arm();
        }
    }

    /// Passes `result` through, disconnecting `target` if it could not be reached.
    pub(crate) async fn disconnect_on_failure<T>(
        &self,
        target: PeerId,
        result: Result<T>,
    ) -> Result<T> {
        if let Err(error) = &result {
            if error.is_unreachable() {
                tracing::warn!(neighbor = target, error = %error, "neighbor call failed");
                self.neighbors.disconnect(target).await;
            }
        }
        result
    }
}
