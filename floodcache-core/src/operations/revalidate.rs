use crate::storage::CachedFileRecord;
use crate::types::FileMetadata;
use crate::{FloodError, Peer, Result};
use std::sync::Arc;

/// Lazy revalidation of a TTR-expired replica against its master.
///
/// On failure the record is left as it was; the caller only learns that this
/// query could not be served.
#[derive(Clone)]
pub struct RevalidateOperation {
    peer: Arc<Peer>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevalidateOperationResult {
    pub metadata: FileMetadata,
    /// True when the master had moved on and fresh bytes were downloaded.
    pub refreshed: bool,
}

impl RevalidateOperation {
    pub fn new(peer: Arc<Peer>) -> Self {
        Self { peer }
    }

    pub async fn run(&self, filename: &str) -> Result<RevalidateOperationResult> {
        let record = self
            .peer
            .entries
            .cached_record(filename)
            .await
            .ok_or_else(|| FloodError::FileNotFound(filename.to_string()))?;

        let result = self.revalidate(&record).await;
        self.peer.stats.record_revalidation(result.is_ok());

        match &result {
            Ok(outcome) => tracing::info!(
                filename = %filename,
                version = outcome.metadata.version,
                refreshed = outcome.refreshed,
                last_fetched = %record.fetched_at,
                "cached copy revalidated"
            ),
            Err(error) => tracing::warn!(
                filename = %filename,
                last_fetched = %record.fetched_at,
                error = %error,
                "lazy revalidation failed, validity unchanged"
            ),
        }
        result
    }

    async fn revalidate(&self, record: &CachedFileRecord) -> Result<RevalidateOperationResult> {
        let peer = &self.peer;
        let filename = record.filename.as_str();
        let master_id = record
            .master_id
            .ok_or_else(|| FloodError::MasterUnknown(filename.to_string()))?;

        let metadata = peer
            .disconnect_on_failure(
                master_id,
                peer.transport.check_metadata(master_id, filename).await,
            )
            .await?;

        let refreshed = metadata.version != record.version;
        if refreshed {
            let data = peer
                .disconnect_on_failure(master_id, peer.transport.obtain(master_id, filename).await)
                .await?
                .ok_or_else(|| FloodError::FileNotFound(filename.to_string()))?;
            peer.files.write_download(filename, &data).await?;
        }

        peer.entries.record_fetch(filename, &metadata).await?;
        peer.arm_scheduler();

        Ok(RevalidateOperationResult {
            metadata,
            refreshed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::{FetchOperation, ModifyOperation};
    use crate::testing::LocalNetwork;
    use crate::types::{ConsistencyMode, Validity};
    use std::time::Duration;

    async fn pull_pair(
        network: &LocalNetwork,
        temp_dir: &tempfile::TempDir,
    ) -> (Arc<Peer>, Arc<Peer>) {
        let master = network
            .open(
                network
                    .config(temp_dir, 1, &[2], ConsistencyMode::Pull)
                    .with_ttr(Duration::from_millis(200)),
            )
            .await;
        let cache = network
            .open(network.config(temp_dir, 2, &[1], ConsistencyMode::Pull))
            .await;
        network.join_all(&[master.clone(), cache.clone()]).await;
        network.add_master(&master, "a.txt", b"v0").await;
        FetchOperation::new(cache.clone())
            .run_from(1, "a.txt")
            .await
            .unwrap();
        (master, cache)
    }

    #[tokio::test]
    async fn test_revalidation_pulls_new_version() {
        let network = LocalNetwork::new();
        let temp_dir = tempfile::tempdir().unwrap();
        let (master, cache) = pull_pair(&network, &temp_dir).await;
        ModifyOperation::new(master.clone()).run("a.txt").await.unwrap();

        let result = RevalidateOperation::new(cache.clone())
            .run("a.txt")
            .await
            .unwrap();

        assert!(result.refreshed);
        assert_eq!(result.metadata.version, 1);
        let record = cache.entries().cached_record("a.txt").await.unwrap();
        assert_eq!(record.version, 1);
        assert_eq!(record.validity, Validity::Valid);
        let on_disk = std::fs::read(cache.files().downloads_dir().join("a.txt")).unwrap();
        assert_eq!(on_disk, b"v0MODIFIED\n");
        assert_eq!(cache.stats().snapshot().revalidations, 1);
    }

    #[tokio::test]
    async fn test_unchanged_master_only_resets_ttr() {
        let network = LocalNetwork::new();
        let temp_dir = tempfile::tempdir().unwrap();
        let (_master, cache) = pull_pair(&network, &temp_dir).await;

        let result = RevalidateOperation::new(cache.clone())
            .run("a.txt")
            .await
            .unwrap();

        assert!(!result.refreshed);
        assert_eq!(result.metadata.version, 0);
    }

    #[tokio::test]
    async fn test_unreachable_master_leaves_validity_alone() {
        let network = LocalNetwork::new();
        let temp_dir = tempfile::tempdir().unwrap();
        let (_master, cache) = pull_pair(&network, &temp_dir).await;

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(cache.entries().has_file("a.txt").await, Validity::TtrExpired);

        network.set_down(1, true);
        let result = RevalidateOperation::new(cache.clone()).run("a.txt").await;

        assert!(result.unwrap_err().is_unreachable());
        assert_eq!(cache.entries().has_file("a.txt").await, Validity::TtrExpired);
        assert_eq!(cache.stats().snapshot().failed_revalidations, 1);
    }

    #[tokio::test]
    async fn test_orphan_has_no_master_to_ask() {
        let network = LocalNetwork::new();
        let temp_dir = tempfile::tempdir().unwrap();
        let peer = network
            .open(network.config(&temp_dir, 2, &[], ConsistencyMode::Pull))
            .await;
        peer.entries().register_orphan("old.txt").await.unwrap();

        let result = RevalidateOperation::new(peer.clone()).run("old.txt").await;
        assert!(matches!(result, Err(FloodError::MasterUnknown(_))));
    }
}
