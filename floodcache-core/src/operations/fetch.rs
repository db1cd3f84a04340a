use crate::operations::QueryOperation;
use crate::storage::validate_filename;
use crate::types::{FileMetadata, PeerId, Validity};
use crate::{FloodError, Peer, Result};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Downloads a replica from another peer.
#[derive(Clone)]
pub struct FetchOperation {
    peer: Arc<Peer>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOperationResult {
    pub source: PeerId,
    pub metadata: FileMetadata,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOperationOutcome {
    /// A valid copy is already held locally.
    AlreadyValid,
    NotAvailable,
    /// The chooser declined every source.
    Cancelled,
    Fetched(FetchOperationResult),
}

impl FetchOperation {
    pub fn new(peer: Arc<Peer>) -> Self {
        Self { peer }
    }

    /// Fetches bytes and metadata from `source` and stores a fresh VALID replica.
    pub async fn run_from(&self, source: PeerId, filename: &str) -> Result<FetchOperationOutcome> {
        validate_filename(filename)?;
        let peer = &self.peer;

        if peer.entries.is_master(filename).await {
            return Err(FloodError::InvalidOperation(format!(
                "{} is mastered by this peer",
                filename
            )));
        }

        let obtained = peer
            .disconnect_on_failure(source, peer.transport.obtain(source, filename).await)
            .await;
        let data = match obtained {
            Ok(Some(data)) => data,
            Ok(None) | Err(FloodError::FileNotFound(_)) | Err(FloodError::StaleCopy(_)) => {
                tracing::info!(source, filename = %filename, "source cannot serve file");
                return Ok(FetchOperationOutcome::NotAvailable);
            }
            Err(error) => return Err(error),
        };

        let metadata = match peer
            .disconnect_on_failure(
                source,
                peer.transport.check_metadata(source, filename).await,
            )
            .await
        {
            Ok(metadata) => metadata,
            Err(FloodError::FileNotFound(_)) => return Ok(FetchOperationOutcome::NotAvailable),
            Err(error) => return Err(error),
        };

        peer.files.write_download(filename, &data).await?;
        let replaced = peer.entries.record_fetch(filename, &metadata).await?;
        peer.arm_scheduler();

        tracing::info!(
            source,
            filename = %filename,
            version = metadata.version,
            master_id = metadata.master_id,
            size = data.len(),
            previous_fetch = ?replaced,
            "file downloaded"
        );

        Ok(FetchOperationOutcome::Fetched(FetchOperationResult {
            source,
            metadata,
            size: data.len(),
        }))
    }

    /// Resolves a file through a search, letting `choose` pick among the sources.
    pub async fn run_via_search<F>(&self, filename: &str, choose: F) -> Result<FetchOperationOutcome>
    where
        F: FnOnce(&BTreeSet<PeerId>) -> Option<PeerId>,
    {
        if self.peer.entries.has_file(filename).await == Validity::Valid {
            return Ok(FetchOperationOutcome::AlreadyValid);
        }

        let sources = QueryOperation::new(self.peer.clone())
            .search(filename)
            .await?;
        if sources.is_empty() {
            tracing::info!(filename = %filename, "file not available in the network");
            return Ok(FetchOperationOutcome::NotAvailable);
        }

        let Some(source) = choose(&sources) else {
            return Ok(FetchOperationOutcome::Cancelled);
        };
        if !sources.contains(&source) {
            return Err(FloodError::InvalidRequest(format!(
                "peer {} is not a source of {}",
                source, filename
            )));
        }

        self.run_from(source, filename).await
    }
}
