use super::transport::PeerTransport;
use super::wire::{ApiResponse, ConnectRequest, ConnectResponse, PartitionRequest, QueryResponse};
use crate::error::{FloodError, Result};
use crate::types::{ConsistencyMode, FileMetadata, PeerId, QueryRequest};
use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Talks to peers over HTTP. Peer `id` listens on `base_port + id`.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    host: String,
    base_port: u16,
}

impl HttpTransport {
    pub fn new(host: impl Into<String>, base_port: u16) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|error| FloodError::Http(error.to_string()))?;

        Ok(Self {
            client,
            host: host.into(),
            base_port,
        })
    }

    pub fn endpoint(&self, target: PeerId) -> Result<String> {
        let port = port_for(self.base_port, target)?;
        Ok(format!("http://{}:{}", self.host, port))
    }

    fn url(&self, target: PeerId, path: &str) -> Result<String> {
        Ok(format!("{}{}", self.endpoint(target)?, path))
    }

    /// URL of a per-file route. The filename is percent-encoded as a single segment.
    pub fn file_url(&self, target: PeerId, route: &str, filename: &str) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.endpoint(target)?)
            .map_err(|error| FloodError::Config(format!("invalid peer endpoint: {}", error)))?;
        url.path_segments_mut()
            .map_err(|_| FloodError::Config("peer endpoint cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(["internal", route, filename]);
        Ok(url)
    }

    async fn send(
        &self,
        target: PeerId,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        request
            .send()
            .await
            .map_err(|error| FloodError::PeerUnreachable {
                peer_id: target,
                reason: error.to_string(),
            })
    }

    async fn decode<T: DeserializeOwned>(
        target: PeerId,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let payload: ApiResponse<T> = response
            .json()
            .await
            .map_err(|error| FloodError::Http(error.to_string()))?;

        if !payload.success {
            return Err(FloodError::Http(format!(
                "peer {} answered {}: {}",
                target,
                status,
                payload.error.unwrap_or_default()
            )));
        }

        payload.data.ok_or_else(|| {
            FloodError::Http(format!("peer {} answered without a payload", target))
        })
    }
}

/// Port of a peer's service. Fails when the id pushes it past `u16::MAX`.
pub fn port_for(base_port: u16, peer_id: PeerId) -> Result<u16> {
    u16::try_from(peer_id)
        .ok()
        .and_then(|offset| base_port.checked_add(offset))
        .ok_or_else(|| {
            FloodError::Config(format!(
                "peer id {} does not fit above base port {}",
                peer_id, base_port
            ))
        })
}

#[async_trait]
impl PeerTransport for HttpTransport {
    async fn obtain(&self, target: PeerId, filename: &str) -> Result<Option<Bytes>> {
        let url = self.file_url(target, "files", filename)?;
        let response = self.send(target, self.client.get(url)).await?;

        match response.status() {
            reqwest::StatusCode::NO_CONTENT => return Ok(None),
            reqwest::StatusCode::NOT_FOUND => {
                return Err(FloodError::FileNotFound(filename.to_string()));
            }
            reqwest::StatusCode::CONFLICT => {
                return Err(FloodError::StaleCopy(filename.to_string()));
            }
            status if !status.is_success() => {
                return Err(FloodError::Http(format!(
                    "obtain {} from peer {} failed: status={}",
                    filename, target, status
                )));
            }
            _ => {}
        }

        let body = response
            .bytes()
            .await
            .map_err(|error| FloodError::Http(error.to_string()))?;
        Ok(Some(body))
    }

    async fn notify_connection(&self, target: PeerId, caller: PeerId) -> Result<ConsistencyMode> {
        let url = self.url(target, "/internal/connect")?;
        let request = self
            .client
            .post(url)
            .json(&ConnectRequest { peer_id: caller });
        let response = self.send(target, request).await?;
        let payload: ConnectResponse = Self::decode(target, response).await?;
        Ok(payload.mode)
    }

    async fn query(&self, target: PeerId, request: QueryRequest) -> Result<BTreeSet<PeerId>> {
        let url = self.url(target, "/internal/query")?;
        let response = self
            .send(target, self.client.post(url).json(&request))
            .await?;
        let payload: QueryResponse = Self::decode(target, response).await?;
        Ok(payload.sources)
    }

    async fn check_metadata(&self, target: PeerId, filename: &str) -> Result<FileMetadata> {
        let url = self.file_url(target, "metadata", filename)?;
        let response = self.send(target, self.client.get(url)).await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(FloodError::FileNotFound(filename.to_string()));
        }

        Self::decode(target, response).await
    }

    async fn receive_neighbors(&self, target: PeerId, neighbors: BTreeSet<PeerId>) -> Result<()> {
        let url = self.url(target, "/internal/partition")?;
        let request = self.client.post(url).json(&PartitionRequest { neighbors });
        let response = self.send(target, request).await?;

        if !response.status().is_success() {
            return Err(FloodError::Http(format!(
                "partition notice to peer {} failed: status={}",
                target,
                response.status()
            )));
        }
        Ok(())
    }
}
