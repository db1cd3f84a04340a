//! Overlay plumbing: who our neighbors are, which floods we already
//! forwarded, and how to reach other peers.

pub mod dedup;
pub mod http;
pub mod neighbors;
pub mod transport;
pub mod wire;

pub use dedup::{Admission, DedupRegistry, QuerySignature};
pub use http::{HttpTransport, port_for};
pub use neighbors::NeighborTable;
pub use transport::PeerTransport;
pub use wire::{ApiResponse, ConnectRequest, ConnectResponse, PartitionRequest, QueryResponse};
