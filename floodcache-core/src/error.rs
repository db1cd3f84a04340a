use crate::types::{ConsistencyMode, PeerId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FloodError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("File not up to date: {0}")]
    StaleCopy(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Peer {peer_id} unreachable: {reason}")]
    PeerUnreachable { peer_id: PeerId, reason: String },

    #[error("Consistency mode mismatch with peer {peer_id}: local {local}, remote {remote}")]
    ModeMismatch {
        peer_id: PeerId,
        local: ConsistencyMode,
        remote: ConsistencyMode,
    },

    #[error("Master unknown for cached file: {0}")]
    MasterUnknown(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FloodError {
    /// True when the error means the remote peer could not be talked to at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, FloodError::PeerUnreachable { .. } | FloodError::Http(_))
    }
}

pub type Result<T> = std::result::Result<T, FloodError>;
