use serde::{Deserialize, Serialize};
use std::fmt;

/// Overlay-wide peer identifier. Also selects the peer's endpoint port.
pub type PeerId = u32;

/// Consistency discipline. Every peer of an overlay must run the same one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsistencyMode {
    Push,
    Pull,
}

impl fmt::Display for ConsistencyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsistencyMode::Push => write!(f, "push"),
            ConsistencyMode::Pull => write!(f, "pull"),
        }
    }
}

impl std::str::FromStr for ConsistencyMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "push" => Ok(ConsistencyMode::Push),
            "pull" => Ok(ConsistencyMode::Pull),
            other => Err(format!("unknown consistency mode: {}", other)),
        }
    }
}

/// What a peer can say about a filename it is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validity {
    Valid,
    TtrExpired,
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Search,
    Invalidation,
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKind::Search => write!(f, "search"),
            QueryKind::Invalidation => write!(f, "invalidation"),
        }
    }
}

/// A flooded query as it travels between peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub sender_id: PeerId,
    pub filename: String,
    pub ttl: u32,
    pub requesting_id: PeerId,
    pub kind: QueryKind,
}

/// Metadata returned by `check_metadata`.
///
/// For a master copy `ttr_ms` is the master's configured refresh interval;
/// for a cached copy it is the time left before the copy must be refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub version: u64,
    pub master_id: PeerId,
    pub ttr_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse_and_display() {
        assert_eq!("PULL".parse::<ConsistencyMode>(), Ok(ConsistencyMode::Pull));
        assert_eq!(" push ".parse::<ConsistencyMode>(), Ok(ConsistencyMode::Push));
        assert!("gossip".parse::<ConsistencyMode>().is_err());
        assert_eq!(ConsistencyMode::Pull.to_string(), "pull");
    }

    #[test]
    fn test_query_request_wire_format() {
        let request = QueryRequest {
            sender_id: 1,
            filename: "a.txt".to_string(),
            ttl: 6,
            requesting_id: 1,
            kind: QueryKind::Invalidation,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["kind"], "invalidation");
        assert_eq!(json["ttl"], 6);
    }
}
