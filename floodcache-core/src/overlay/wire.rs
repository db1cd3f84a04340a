//! JSON bodies exchanged between peers.

use crate::types::{ConsistencyMode, PeerId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Envelope wrapping every JSON response of the peer service.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectRequest {
    pub peer_id: PeerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectResponse {
    pub mode: ConsistencyMode,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResponse {
    pub sources: BTreeSet<PeerId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionRequest {
    pub neighbors: BTreeSet<PeerId>,
}
