use crate::service::chains::ConfigChainRegistry;
use crate::service::metrics::Metrics;
use std::sync::Arc;
use warden_core::application::{PartyCoordinator, SignatureRequestBroker};
use warden_core::domain::EngineDeps;

#[derive(Clone)]
pub struct RpcState {
    pub coordinator: Arc<PartyCoordinator>,
    pub broker: Arc<SignatureRequestBroker>,
    pub chains: Arc<ConfigChainRegistry>,
    pub engine: EngineDeps,
    pub metrics: Arc<Metrics>,
    pub rpc_token: Option<String>,
    /// This node's gossip pubkey, as it appears in the signer set.
    pub local_peer: String,
    pub signer_set: Vec<String>,
}
