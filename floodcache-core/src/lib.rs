//! Floodcache Core - peer library for an unstructured file-sharing overlay
//!
//! Each peer masters some files and caches replicas of others:
//! - Searches and invalidations flood to neighbors, bounded by a hop TTL
//! - Recently forwarded queries are suppressed by a dedup window
//! - Push mode invalidates replicas when a master changes
//! - Pull mode ages replicas by TTR and revalidates them lazily

pub mod config;
pub mod error;
pub mod operations;
pub mod overlay;
pub mod peer;
pub mod scheduler;
pub mod stats;
pub mod storage;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{
    DEFAULT_BASE_PORT, DEFAULT_DEDUP_CAPACITY, DEFAULT_DEDUP_WINDOW_SECS,
    DEFAULT_MAX_SCHEDULER_INSTANCES, DEFAULT_TTL, DEFAULT_TTR_MS, PeerConfig,
};
pub use error::{FloodError, Result};
pub use operations::{
    FetchOperation, FetchOperationOutcome, FetchOperationResult, JoinOperation,
    JoinOperationResult, ModifyOperation, ModifyOperationResult, ObtainOperation,
    ObtainOperationOutcome, PartitionOperation, QueryOperation, QueryOperationResult,
    RevalidateOperation, RevalidateOperationResult, ShutdownOperation,
};
pub use overlay::{
    Admission, ApiResponse, ConnectRequest, ConnectResponse, DedupRegistry, HttpTransport,
    NeighborTable, PartitionRequest, PeerTransport, QueryResponse, port_for,
};
pub use peer::Peer;
pub use scheduler::{ArmOutcome, RevalidationScheduler};
pub use stats::{PeerStats, StatsSnapshot};
pub use storage::{CachedFileRecord, EntryStore, FileLocation, FileStore, validate_filename};
pub use types::{ConsistencyMode, FileMetadata, PeerId, QueryKind, QueryRequest, Validity};
