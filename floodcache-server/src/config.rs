use floodcache_core::{
    ConsistencyMode, DEFAULT_BASE_PORT, DEFAULT_DEDUP_CAPACITY, DEFAULT_DEDUP_WINDOW_SECS,
    DEFAULT_MAX_SCHEDULER_INSTANCES, DEFAULT_TTL, DEFAULT_TTR_MS, FloodError, PeerConfig, PeerId,
    Result, port_for,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub peer_id: PeerId,
    #[serde(default)]
    pub neighbors: Vec<PeerId>,
    #[serde(default = "default_mode")]
    pub mode: ConsistencyMode,
    #[serde(default = "default_ttr_ms")]
    pub ttr_ms: u64,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_base_port")]
    pub base_port: u16,
    #[serde(default = "default_files_dir")]
    pub files_dir: PathBuf,
    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: PathBuf,
    #[serde(default = "default_ttl")]
    pub ttl: u32,
    #[serde(default = "default_dedup_window_secs")]
    pub dedup_window_secs: u64,
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
    #[serde(default = "default_max_scheduler_instances")]
    pub max_scheduler_instances: usize,
}

fn default_mode() -> ConsistencyMode {
    ConsistencyMode::Push
}

fn default_ttr_ms() -> u64 {
    DEFAULT_TTR_MS
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_base_port() -> u16 {
    DEFAULT_BASE_PORT
}

fn default_files_dir() -> PathBuf {
    PathBuf::from("./files")
}

fn default_downloads_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_ttl() -> u32 {
    DEFAULT_TTL
}

fn default_dedup_window_secs() -> u64 {
    DEFAULT_DEDUP_WINDOW_SECS
}

fn default_dedup_capacity() -> usize {
    DEFAULT_DEDUP_CAPACITY
}

fn default_max_scheduler_instances() -> usize {
    DEFAULT_MAX_SCHEDULER_INSTANCES
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(path))
            .add_source(
                ::config::Environment::with_prefix("FLOODCACHE")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("neighbors"),
            )
            .build()
            .map_err(|e| FloodError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| FloodError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Address this peer's service listens on.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let port = port_for(self.base_port, self.peer_id)?;
        format!("{}:{}", self.host, port)
            .parse()
            .map_err(|e| FloodError::Config(format!("invalid host {}: {}", self.host, e)))
    }

    /// Builds the validated runtime config. `mode` overrides the file when given.
    pub fn runtime(&self, mode: Option<ConsistencyMode>) -> Result<PeerConfig> {
        let mut peer = PeerConfig::new(
            self.peer_id,
            self.neighbors.clone(),
            mode.unwrap_or(self.mode),
            self.files_dir.clone(),
            self.downloads_dir.clone(),
        )
        .with_ttr(Duration::from_millis(self.ttr_ms))
        .with_ttl(self.ttl);
        peer.dedup_window = Duration::from_secs(self.dedup_window_secs);
        peer.dedup_capacity = self.dedup_capacity;
        peer.max_scheduler_instances = self.max_scheduler_instances;

        peer.validate()?;
        for neighbor in &peer.neighbors {
            port_for(self.base_port, *neighbor)?;
        }
        self.bind_addr()?;

        Ok(peer)
    }
}
