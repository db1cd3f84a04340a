use crate::storage::{FileLocation, validate_filename};
use crate::types::Validity;
use crate::{FloodError, Peer, Result};
use bytes::Bytes;
use std::sync::Arc;

/// Serves file bytes to another peer.
#[derive(Clone)]
pub struct ObtainOperation {
    peer: Arc<Peer>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObtainOperationOutcome {
    Found(Bytes),
    /// The record existed but the file is gone from disk. The record was dropped.
    Vanished,
}

impl ObtainOperation {
    pub fn new(peer: Arc<Peer>) -> Self {
        Self { peer }
    }

    pub async fn run(&self, filename: &str) -> Result<ObtainOperationOutcome> {
        validate_filename(filename)?;
        let entries = &self.peer.entries;

        let location = if entries.is_master(filename).await {
            FileLocation::Master
        } else {
            let record = entries
                .cached_record(filename)
                .await
                .ok_or_else(|| FloodError::FileNotFound(filename.to_string()))?;
            if record.validity != Validity::Valid {
                return Err(FloodError::StaleCopy(filename.to_string()));
            }
            FileLocation::Download
        };

        match self.peer.files.read(location, filename).await? {
            Some(data) => {
                tracing::debug!(filename = %filename, size = data.len(), "serving file");
                Ok(ObtainOperationOutcome::Found(data))
            }
            None => {
                tracing::warn!(filename = %filename, "file vanished from disk, dropping record");
                entries.remove(filename).await;
                Ok(ObtainOperationOutcome::Vanished)
            }
        }
    }
}
