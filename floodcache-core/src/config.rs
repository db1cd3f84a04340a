use crate::error::{FloodError, Result};
use crate::types::{ConsistencyMode, PeerId};
use std::path::PathBuf;
use std::time::Duration;

/// Hop budget for peer-initiated floods.
pub const DEFAULT_TTL: u32 = 6;
pub const DEFAULT_TTR_MS: u64 = 6000;
pub const DEFAULT_BASE_PORT: u16 = 1099;
pub const DEFAULT_DEDUP_WINDOW_SECS: u64 = 15;
pub const DEFAULT_DEDUP_CAPACITY: usize = 1000;
pub const DEFAULT_MAX_SCHEDULER_INSTANCES: usize = 5;

/// Runtime configuration of a single peer.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub peer_id: PeerId,
    pub neighbors: Vec<PeerId>,
    pub mode: ConsistencyMode,
    pub ttr: Duration,
    pub ttl: u32,
    pub files_dir: PathBuf,
    pub downloads_dir: PathBuf,
    pub dedup_window: Duration,
    pub dedup_capacity: usize,
    pub max_scheduler_instances: usize,
}

impl PeerConfig {
    pub fn new(
        peer_id: PeerId,
        neighbors: Vec<PeerId>,
        mode: ConsistencyMode,
        files_dir: PathBuf,
        downloads_dir: PathBuf,
    ) -> Self {
        Self {
            peer_id,
            neighbors,
            mode,
            ttr: Duration::from_millis(DEFAULT_TTR_MS),
            ttl: DEFAULT_TTL,
            files_dir,
            downloads_dir,
            dedup_window: Duration::from_secs(DEFAULT_DEDUP_WINDOW_SECS),
            dedup_capacity: DEFAULT_DEDUP_CAPACITY,
            max_scheduler_instances: DEFAULT_MAX_SCHEDULER_INSTANCES,
        }
    }

    pub fn with_ttr(mut self, ttr: Duration) -> Self {
        self.ttr = ttr;
        self
    }

    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.ttl == 0 {
            return Err(FloodError::Config("ttl must be at least 1".to_string()));
        }

        if self.ttr.as_millis() == 0 {
            return Err(FloodError::Config("ttr must be at least 1ms".to_string()));
        }

        if self.neighbors.contains(&self.peer_id) {
            return Err(FloodError::Config(format!(
                "peer {} lists itself as a neighbor",
                self.peer_id
            )));
        }

        if self.files_dir.as_os_str().is_empty() || self.downloads_dir.as_os_str().is_empty() {
            return Err(FloodError::Config(
                "files_dir and downloads_dir cannot be empty".to_string(),
            ));
        }

        if self.files_dir == self.downloads_dir {
            return Err(FloodError::Config(
                "files_dir and downloads_dir must differ".to_string(),
            ));
        }

        if self.max_scheduler_instances == 0 {
            return Err(FloodError::Config(
                "max_scheduler_instances must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
