//! Recognized configuration surface (§6). Owned here so every crate agrees
//! on field names and defaults; `node-runtime` is the only crate that reads
//! it from a file or the environment.

use serde::{Deserialize, Serialize};

use crate::filters::SubscriptionFilters;

fn default_workers() -> usize {
    1
}

fn default_ipc_path() -> String {
    "~/.vulcanize/vulcanize.ipc".to_string()
}

fn default_ws_endpoint() -> String {
    "127.0.0.1:80".to_string()
}

fn default_ipfs_path() -> String {
    "~/.ipfs".to_string()
}

fn default_backfill_frequency_minutes() -> u64 {
    5
}

fn default_max_open_connections() -> u32 {
    4
}

fn default_max_idle_connections() -> u32 {
    2
}

/// `client.*`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_ipfs_path")]
    pub ipfs_path: String,
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Upstream websocket URL for the primary (non-archival) chain node.
    pub ws_endpoint: String,
}

/// `server.*`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_ipc_path")]
    pub ipc_path: String,
    #[serde(default = "default_ws_endpoint")]
    pub ws_endpoint: String,
}

/// `backfill.*`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillConfig {
    #[serde(default)]
    pub on: bool,
    pub ipc_path: String,
    #[serde(default = "default_backfill_frequency_minutes")]
    pub frequency_minutes: u64,
}

/// `subscription.*`, the defaults a locally-configured subscriber inherits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionDefaults {
    #[serde(default)]
    pub backfill: bool,
    #[serde(default)]
    pub backfill_only: bool,
    /// 0 means "from tip".
    #[serde(default)]
    pub starting_block: u64,
    /// 0 means "indefinitely".
    #[serde(default)]
    pub ending_block: u64,
    #[serde(flatten)]
    pub filters: SubscriptionFilters,
}

/// `database.*`: connection string plus the pool knobs the original's
/// `pkg/datastore/postgres` reads out of `config.Database`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_open_connections")]
    pub max_open_connections: u32,
    #[serde(default = "default_max_idle_connections")]
    pub max_idle_connections: u32,
}

/// `node.*`: the chain-client identity bootstrapped into `eth_nodes` once
/// per process start (§6 names `eth_nodes` as a schema table; the original's
/// `DB.CreateNode` is what populates it, tagging every `header_cids` row
/// with the client that produced it).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EthNodeConfig {
    pub genesis_block: String,
    pub network_id: i64,
    pub eth_node_id: String,
    pub client_name: String,
}

/// Top-level configuration document, loaded by `node-runtime` from a TOML
/// file with environment-variable overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub client: ClientConfig,
    pub server: ServerConfig,
    pub backfill: BackfillConfig,
    pub subscription: SubscriptionDefaults,
    pub database: DatabaseConfig,
    pub node: EthNodeConfig,
}
