use crate::domain::Curve;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level node configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WardenConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub gossip: GossipConfig,
    #[serde(default)]
    pub signing: SigningConfig,
    #[serde(default)]
    pub chains: Vec<ChainConfig>,
    #[serde(default)]
    pub bridge: BridgeConfig,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub data_dir: String,
    /// Directory for rolling log files. Console-only when unset.
    #[serde(default)]
    pub log_dir: Option<String>,
    /// Filter expression, e.g. `"info"` or `"warden_core=debug,iroh=info"`.
    #[serde(default)]
    pub log_filters: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub addr: String,
    /// Shared API token for /rpc, /ready and /metrics. Open when unset.
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self { enabled: true, addr: String::new(), token: None }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GossipConfig {
    /// Logical network a node participates in; topic derivation includes it,
    /// so nodes on different network ids never see each other's traffic.
    #[serde(default)]
    pub network_id: u8,
    /// Signer-group label mixed into the gossip topic.
    #[serde(default)]
    pub group_id: String,
    /// Hex-encoded endpoint ids of peers to join through.
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
    /// Hex-encoded node secret key. Generated fresh when unset.
    #[serde(default)]
    pub secret_key: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SigningConfig {
    /// Gossip pubkeys of every signer in the group, including this node.
    #[serde(default)]
    pub signer_set: Vec<String>,
    #[serde(default)]
    pub round_timeout_secs: u64,
    /// How long a buffered round waits for its start announcement.
    #[serde(default)]
    pub join_window_secs: u64,
    /// How long a signature request waits for the group result.
    #[serde(default)]
    pub signature_wait_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: String,
    pub curve: Curve,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    #[serde(default)]
    pub rpc_url: String,
}

fn default_decimals() -> u8 {
    8
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Bridge wallet address per chain id.
    #[serde(default)]
    pub wallets: HashMap<String, String>,
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TokenConfig {
    pub chain_id: String,
    pub address: String,
    #[serde(default)]
    pub symbol: String,
}

fn default_true() -> bool {
    true
}
