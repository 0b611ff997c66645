use crate::cli::Cli;
use iroh::{EndpointAddr, EndpointId, SecretKey, TransportAddr};
use log::info;
use rand::RngCore;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use warden_core::foundation::{CustodyError, GroupId};
use warden_core::infrastructure::config::{load_config, load_config_from_file, WardenConfig};

pub fn load_node_config(args: &Cli) -> Result<WardenConfig, CustodyError> {
    let data_dir = args.data_dir.clone().unwrap_or_else(|| PathBuf::from("./.warden"));
    let mut config = match &args.config {
        Some(path) => load_config_from_file(path, &data_dir)?,
        None => load_config(&data_dir)?,
    };
    if let Some(addr) = &args.rpc_addr {
        config.rpc.addr = addr.clone();
    }
    if let Some(filters) = &args.log_filters {
        config.service.log_filters = filters.clone();
    }
    Ok(config)
}

/// Node secret key: taken from config when set, otherwise loaded from (or
/// created at) `<data_dir>/iroh/identity.json` so the endpoint id survives
/// restarts.
pub fn node_secret(config: &WardenConfig) -> Result<SecretKey, CustodyError> {
    if let Some(secret_hex) = config.gossip.secret_key.as_deref() {
        return Ok(SecretKey::from(parse_seed_hex(secret_hex)?));
    }
    let seed = load_or_create_seed(&config.service.data_dir)?;
    Ok(SecretKey::from(seed))
}

fn parse_seed_hex(value: &str) -> Result<[u8; 32], CustodyError> {
    let bytes = hex::decode(value.trim())?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| CustodyError::ConfigError("gossip.secret_key must be 32 hex bytes".to_string()))
}

fn load_or_create_seed(data_dir: &str) -> Result<[u8; 32], CustodyError> {
    #[derive(serde::Serialize, serde::Deserialize)]
    struct IdentityRecord {
        seed_hex: String,
    }

    let identity_dir = PathBuf::from(data_dir).join("iroh");
    let identity_path = identity_dir.join("identity.json");
    if identity_path.exists() {
        let bytes = std::fs::read(&identity_path)?;
        let record: IdentityRecord = serde_json::from_slice(&bytes)?;
        return parse_seed_hex(&record.seed_hex);
    }

    std::fs::create_dir_all(&identity_dir)?;
    let mut seed = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut seed);
    let record = IdentityRecord { seed_hex: hex::encode(seed) };
    std::fs::write(&identity_path, serde_json::to_vec_pretty(&record)?)?;
    info!("created node identity at {}", identity_path.display());
    Ok(seed)
}

/// Bootstrap entries are either a bare endpoint id (resolved via discovery)
/// or `endpoint_id@host:port` for direct dialing. Returns the direct
/// addresses plus the full id list for gossip joins.
pub fn parse_bootstrap_peers(entries: &[String]) -> Result<(Vec<EndpointAddr>, Vec<String>), CustodyError> {
    let mut static_addrs = Vec::new();
    let mut ids = Vec::new();
    for entry in entries.iter().filter(|s| !s.trim().is_empty()) {
        let mut parts = entry.splitn(2, '@');
        let id_str = parts.next().unwrap_or_default().trim();
        let id = EndpointId::from_str(id_str)
            .map_err(|err| CustodyError::ConfigError(format!("invalid bootstrap endpoint id {}: {}", id_str, err)))?;
        ids.push(id_str.to_string());
        if let Some(addr_str) = parts.next() {
            let sock: SocketAddr = addr_str
                .trim()
                .parse()
                .map_err(|err| CustodyError::ConfigError(format!("invalid bootstrap address {}: {}", addr_str, err)))?;
            static_addrs.push(EndpointAddr::from_parts(id, [TransportAddr::Ip(sock)]));
        }
    }
    Ok((static_addrs, ids))
}

pub async fn init_iroh_gossip(
    static_addrs: Vec<EndpointAddr>,
    secret_key: SecretKey,
) -> Result<(iroh_gossip::net::Gossip, iroh::protocol::Router), CustodyError> {
    let mut builder = iroh::Endpoint::empty_builder(iroh::endpoint::RelayMode::Disabled).secret_key(secret_key);
    let static_provider = iroh::discovery::static_provider::StaticProvider::new();
    if !static_addrs.is_empty() {
        for addr in &static_addrs {
            static_provider.add_endpoint_info(addr.clone());
        }
        builder = builder.discovery(static_provider);
    }
    let endpoint = builder.bind().await.map_err(|err| CustodyError::NetworkError(err.to_string()))?;
    let gossip = iroh_gossip::net::Gossip::builder().spawn(endpoint.clone());
    let router = iroh::protocol::Router::builder(endpoint).accept(iroh_gossip::net::GOSSIP_ALPN, gossip.clone()).spawn();
    Ok((gossip, router))
}

/// The gossip topic seed for a signer group.
pub fn group_topic(group_id: &str) -> GroupId {
    GroupId::new(*blake3::hash(group_id.as_bytes()).as_bytes())
}
