use crate::operations::QueryOperation;
use crate::storage::{MODIFICATION_MARKER, validate_filename};
use crate::types::{ConsistencyMode, QueryKind};
use crate::{FloodError, Peer, Result};
use std::sync::Arc;

/// Local edit of a master file.
#[derive(Clone)]
pub struct ModifyOperation {
    peer: Arc<Peer>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyOperationResult {
    pub version: u64,
    /// Invalidation queries sent directly by this peer.
    pub invalidations_sent: usize,
}

impl ModifyOperation {
    pub fn new(peer: Arc<Peer>) -> Self {
        Self { peer }
    }

    /// Appends the modification marker and bumps the version. In push mode
    /// every connected neighbor then receives an invalidation flood.
    pub async fn run(&self, filename: &str) -> Result<ModifyOperationResult> {
        validate_filename(filename)?;
        let peer = &self.peer;

        if !peer.entries.is_master(filename).await {
            return Err(FloodError::InvalidOperation(format!(
                "{} is not a master file of this peer",
                filename
            )));
        }

        peer.files
            .append_master(filename, MODIFICATION_MARKER)
            .await?;
        let version = peer.entries.increment_version(filename).await?;
        tracing::info!(filename = %filename, version, "master file modified");

        let invalidations_sent = match peer.config.mode {
            ConsistencyMode::Push => self.broadcast_invalidation(filename).await,
            ConsistencyMode::Pull => 0,
        };

        Ok(ModifyOperationResult {
            version,
            invalidations_sent,
        })
    }

    async fn broadcast_invalidation(&self, filename: &str) -> usize {
        let targets = self.peer.neighbors.connected().await;
        QueryOperation::new(self.peer.clone())
            .originate(filename, QueryKind::Invalidation, &targets)
            .await;

        tracing::debug!(
            filename = %filename,
            neighbors = targets.len(),
            "invalidation broadcast"
        );
        targets.len()
    }
}
