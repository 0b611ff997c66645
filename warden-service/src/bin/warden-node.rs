#[path = "warden-node/cli.rs"]
mod cli;
#[path = "warden-node/setup.rs"]
mod setup;

use crate::cli::Cli;
use log::{info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use warden_core::application::{PartyCoordinator, SignatureRequestBroker};
use warden_core::domain::EngineDeps;
use warden_core::infrastructure::logging::init_logger;
use warden_core::infrastructure::storage::{KeyShareStore, MemoryKeyShareStore};
use warden_core::infrastructure::transport::IrohTransport;
use warden_service::api::{run_json_rpc_server, RpcState};
use warden_service::service::chains::{ConfigBridgeRegistry, ConfigChainRegistry, PassthroughSolver};
use warden_service::service::metrics::Metrics;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse_args();
    let config = setup::load_node_config(&args)?;
    init_logger(config.service.log_dir.as_deref(), &config.service.log_filters);
    info!(
        "warden-node starting data_dir={} chains={} signer_set_size={} rpc_enabled={}",
        config.service.data_dir,
        config.chains.len(),
        config.signing.signer_set.len(),
        config.rpc.enabled
    );

    let secret_key = setup::node_secret(&config)?;
    let local_peer = secret_key.public().to_string();
    let group_id = setup::group_topic(&config.gossip.group_id);
    let (static_addrs, bootstrap_ids) = setup::parse_bootstrap_peers(&config.gossip.bootstrap_peers)?;
    info!(
        "gossip identity ready peer={} group={} network_id={} bootstrap_peers={}",
        local_peer,
        hex::encode(group_id),
        config.gossip.network_id,
        bootstrap_ids.len()
    );
    if !config.signing.signer_set.iter().any(|peer| peer == &local_peer) {
        warn!("local peer is not in the configured signer set peer={}", local_peer);
    }

    let (gossip, _iroh_router) = setup::init_iroh_gossip(static_addrs, secret_key).await?;
    let transport = Arc::new(IrohTransport::new(
        gossip,
        local_peer.clone().into(),
        group_id,
        config.gossip.network_id,
        &bootstrap_ids,
    )?);

    let store: Arc<dyn KeyShareStore> = Arc::new(MemoryKeyShareStore::new());
    let coordinator = Arc::new(PartyCoordinator::new(
        transport,
        store,
        Duration::from_secs(config.signing.round_timeout_secs),
        Duration::from_secs(config.signing.join_window_secs),
    ));
    {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            if let Err(err) = coordinator.run().await {
                warn!("coordinator loop stopped err={}", err);
            }
        });
    }

    let broker = Arc::new(SignatureRequestBroker::new(
        Arc::clone(&coordinator),
        Duration::from_secs(config.signing.signature_wait_secs),
    ));

    let chains = Arc::new(ConfigChainRegistry::from_config(&config.chains));
    let engine = EngineDeps {
        chains: chains.clone(),
        bridge: Arc::new(ConfigBridgeRegistry::from_config(&config.bridge)),
        solver: Arc::new(PassthroughSolver),
    };
    let metrics = Arc::new(Metrics::new()?);

    if config.rpc.enabled {
        let rpc_addr: SocketAddr = config
            .rpc
            .addr
            .parse()
            .map_err(|err| format!("invalid rpc.addr {}: {}", config.rpc.addr, err))?;
        let rpc_state = Arc::new(RpcState {
            coordinator,
            broker,
            chains,
            engine,
            metrics,
            rpc_token: config.rpc.token.clone(),
            local_peer,
            signer_set: config.signing.signer_set.clone(),
        });
        info!("starting json-rpc server rpc_addr={}", rpc_addr);
        tokio::spawn(async move {
            if let Err(err) = run_json_rpc_server(rpc_addr, rpc_state).await {
                warn!("json-rpc server error: {}", err);
            }
        });
    }

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    Ok(())
}
