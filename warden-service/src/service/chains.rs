//! Config-backed implementations of the chain, bridge, and solver seams.
//!
//! A node only needs chain metadata (curve, decimals) to coordinate keygen
//! and signing. Transaction building and broadcasting happen in external
//! per-chain workers, so the network-facing `Blockchain` methods here return
//! typed errors instead of talking to nodes.

use async_trait::async_trait;
use log::warn;
use std::collections::HashMap;
use std::sync::Arc;
use warden_core::domain::{Blockchain, BridgeRegistry, ChainRegistry, Curve, Intent, Solver, Transfer};
use warden_core::foundation::{ChainId, CustodyError, Result};
use warden_core::infrastructure::config::{BridgeConfig, ChainConfig};

/// Chain metadata from `[[chains]]` config entries. Carries what the
/// signing path needs and rejects everything that requires a node RPC.
pub struct ConfigChain {
    chain_id: ChainId,
    curve: Curve,
    decimals: u8,
    rpc_url: String,
}

impl ConfigChain {
    pub fn new(config: &ChainConfig) -> Self {
        Self {
            chain_id: config.chain_id.clone().into(),
            curve: config.curve,
            decimals: config.decimals,
            rpc_url: config.rpc_url.clone(),
        }
    }

    fn no_rpc(&self, operation: &str) -> CustodyError {
        if self.rpc_url.is_empty() {
            CustodyError::Unimplemented(format!("{} requires a chain worker for {}", operation, self.chain_id))
        } else {
            CustodyError::NodeRpcError(format!("{} not handled in-process for {}, rpc_url={}", operation, self.chain_id, self.rpc_url))
        }
    }
}

#[async_trait]
impl Blockchain for ConfigChain {
    fn chain_id(&self) -> &ChainId {
        &self.chain_id
    }

    fn key_curve(&self) -> Curve {
        self.curve
    }

    fn decimals(&self) -> u8 {
        self.decimals
    }

    async fn broadcast_transaction(&self, _serialized_txn: &str, _signature: &str, _public_key: &[u8]) -> Result<String> {
        Err(self.no_rpc("broadcast_transaction"))
    }

    async fn get_transfers(&self, _tx_hash: &str, _address: &str) -> Result<Vec<Transfer>> {
        Err(self.no_rpc("get_transfers"))
    }

    async fn is_confirmed(&self, _tx_hash: &str) -> Result<bool> {
        Err(self.no_rpc("is_confirmed"))
    }

    async fn build_withdraw_tx(
        &self,
        _bridge_address: &str,
        _solver_output: &str,
        _user_address: &str,
        _token: Option<&str>,
    ) -> Result<(String, String)> {
        Err(self.no_rpc("build_withdraw_tx"))
    }

    async fn token_balance(&self, _token: &str, _owner: &str) -> Result<u128> {
        Err(self.no_rpc("token_balance"))
    }
}

/// Registry over all configured chains.
pub struct ConfigChainRegistry {
    chains: HashMap<ChainId, Arc<dyn Blockchain>>,
}

impl ConfigChainRegistry {
    pub fn from_config(configs: &[ChainConfig]) -> Self {
        let mut chains: HashMap<ChainId, Arc<dyn Blockchain>> = HashMap::new();
        for config in configs {
            let chain = ConfigChain::new(config);
            chains.insert(chain.chain_id.clone(), Arc::new(chain));
        }
        Self { chains }
    }

    pub fn chain_ids(&self) -> Vec<ChainId> {
        let mut ids: Vec<ChainId> = self.chains.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl ChainRegistry for ConfigChainRegistry {
    fn get(&self, chain_id: &ChainId) -> Result<Arc<dyn Blockchain>> {
        self.chains
            .get(chain_id)
            .cloned()
            .ok_or_else(|| CustodyError::UnsupportedChain(chain_id.to_string()))
    }
}

/// Bridge surface backed by the `[bridge]` config section. Token lookups
/// match on chain id plus case-insensitive address.
pub struct ConfigBridgeRegistry {
    wallets: HashMap<String, String>,
    tokens: Vec<(String, String)>,
}

impl ConfigBridgeRegistry {
    pub fn from_config(config: &BridgeConfig) -> Self {
        let tokens = config
            .tokens
            .iter()
            .map(|t| (t.chain_id.clone(), t.address.clone()))
            .collect();
        Self { wallets: config.wallets.clone(), tokens }
    }
}

#[async_trait]
impl BridgeRegistry for ConfigBridgeRegistry {
    async fn token_exists(&self, chain_id: &ChainId, src_token: &str) -> Result<(bool, String)> {
        for (token_chain, address) in &self.tokens {
            if token_chain == chain_id.as_str() && address.eq_ignore_ascii_case(src_token) {
                return Ok((true, address.clone()));
            }
        }
        Ok((false, String::new()))
    }

    fn bridge_wallet(&self, chain_id: &ChainId) -> Result<String> {
        self.wallets
            .get(chain_id.as_str())
            .cloned()
            .ok_or_else(|| CustodyError::ConfigError(format!("no bridge wallet configured for chain {}", chain_id)))
    }
}

/// Solver that returns the payload the intent already carries. External
/// solver plugins replace this in deployments that need route construction.
pub struct PassthroughSolver;

#[async_trait]
impl Solver for PassthroughSolver {
    async fn construct(&self, solver: &str, intent: &Intent, op_index: usize) -> Result<String> {
        let op = intent
            .operations
            .get(op_index)
            .ok_or_else(|| CustodyError::InvalidOperation(format!("solver operation index {} out of range", op_index)))?;
        if let Some(payload) = &op.solver_data_to_sign {
            return Ok(payload.clone());
        }
        warn!("solver={} op={} has no solver_data_to_sign", solver, op.id);
        Err(CustodyError::MissingField { index: op_index, field: "solver_data_to_sign".to_string() })
    }
}
