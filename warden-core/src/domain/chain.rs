use crate::domain::curve::Curve;
use crate::domain::intent::Intent;
use crate::foundation::{ChainId, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Chain families that share address/signature encoding rules.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChainFamily {
    Evm,
    Bitcoin,
    Dogecoin,
    Solana,
    Sui,
    Aptos,
    Ripple,
    Cardano,
    Stellar,
    Algorand,
    Other,
}

impl ChainFamily {
    pub fn of(chain_id: &ChainId) -> Self {
        match chain_id.as_str().to_ascii_lowercase().as_str() {
            "ethereum" | "arbitrum" | "optimism" | "base" | "polygon" | "bsc" | "avalanche" => ChainFamily::Evm,
            "bitcoin" => ChainFamily::Bitcoin,
            "dogecoin" => ChainFamily::Dogecoin,
            "solana" => ChainFamily::Solana,
            "sui" => ChainFamily::Sui,
            "aptos" => ChainFamily::Aptos,
            "ripple" | "xrp" => ChainFamily::Ripple,
            "cardano" => ChainFamily::Cardano,
            "stellar" => ChainFamily::Stellar,
            "algorand" => ChainFamily::Algorand,
            _ => ChainFamily::Other,
        }
    }
}

/// One token movement observed in a confirmed transaction.
#[derive(Clone, Debug)]
pub struct Transfer {
    pub token: String,
    pub from: String,
    pub to: String,
    pub amount: u128,
}

/// Uniform capability over per-chain builders/parsers/broadcasters. The
/// concrete implementations live outside this engine.
#[async_trait]
pub trait Blockchain: Send + Sync {
    fn chain_id(&self) -> &ChainId;
    fn key_curve(&self) -> Curve;
    fn decimals(&self) -> u8;

    async fn broadcast_transaction(&self, serialized_txn: &str, signature: &str, public_key: &[u8]) -> Result<String>;

    async fn get_transfers(&self, tx_hash: &str, address: &str) -> Result<Vec<Transfer>>;

    async fn is_confirmed(&self, tx_hash: &str) -> Result<bool>;

    /// Returns `(serialized_txn, data_to_sign)`.
    async fn build_withdraw_tx(
        &self,
        bridge_address: &str,
        solver_output: &str,
        user_address: &str,
        token: Option<&str>,
    ) -> Result<(String, String)>;

    async fn token_balance(&self, token: &str, owner: &str) -> Result<u128>;
}

pub trait ChainRegistry: Send + Sync {
    fn get(&self, chain_id: &ChainId) -> Result<Arc<dyn Blockchain>>;
}

/// Bridge/registry contract surface.
#[async_trait]
pub trait BridgeRegistry: Send + Sync {
    /// Returns `(exists, pegged_address)` for a source token on a chain.
    async fn token_exists(&self, chain_id: &ChainId, src_token: &str) -> Result<(bool, String)>;

    /// The bridge custody wallet address on a chain.
    fn bridge_wallet(&self, chain_id: &ChainId) -> Result<String>;
}

/// Opaque solver plugin surface.
#[async_trait]
pub trait Solver: Send + Sync {
    async fn construct(&self, solver: &str, intent: &Intent, op_index: usize) -> Result<String>;
}
