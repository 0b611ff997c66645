//! Layered configuration via Figment.
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. TOML config file
//! 3. Environment variables (`WARDEN_*` prefix, `__` as section separator)

use crate::foundation::constants::{MAX_BOOTSTRAP_PEERS, MAX_SIGNERS};
use crate::foundation::{CustodyError, Result};
use crate::infrastructure::config::types::WardenConfig;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use log::{debug, info};
use std::path::Path;

const CONFIG_FILE_NAME: &str = "warden-config.toml";

const DEFAULT_RPC_ADDR: &str = "127.0.0.1:8099";
const DEFAULT_ROUND_TIMEOUT_SECS: u64 = 300;
const DEFAULT_JOIN_WINDOW_SECS: u64 = 60;
const DEFAULT_SIGNATURE_WAIT_SECS: u64 = 300;

/// Example: `WARDEN_RPC__ADDR` -> `rpc.addr`
const ENV_PREFIX: &str = "WARDEN_";

/// Load configuration from the default file in `data_dir` (`warden-config.toml`).
pub fn load_config(data_dir: &Path) -> Result<WardenConfig> {
    let config_path = data_dir.join(CONFIG_FILE_NAME);
    load_config_from_file(&config_path, data_dir)
}

/// Load configuration from a specific file path.
pub fn load_config_from_file(path: &Path, data_dir: &Path) -> Result<WardenConfig> {
    info!("loading configuration path={} data_dir={}", path.display(), data_dir.display());

    let mut figment = Figment::new().merge(Serialized::defaults(WardenConfig::default()));
    if path.exists() {
        figment = figment.merge(Toml::file(path));
    } else {
        debug!("configuration file missing; using defaults and env only path={}", path.display());
    }
    let figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    let mut config: WardenConfig =
        figment.extract().map_err(|e| CustodyError::ConfigError(format!("config extraction failed: {e}")))?;
    postprocess(&mut config, data_dir);
    validate(&config)?;

    debug!(
        "configuration loaded rpc_addr={} rpc_enabled={} signer_set_size={} chains={}",
        config.rpc.addr,
        config.rpc.enabled,
        config.signing.signer_set.len(),
        config.chains.len()
    );
    Ok(config)
}

fn postprocess(config: &mut WardenConfig, data_dir: &Path) {
    if config.service.data_dir.trim().is_empty() {
        config.service.data_dir = data_dir.to_string_lossy().to_string();
    }
    if config.service.log_filters.trim().is_empty() {
        config.service.log_filters = "info".to_string();
    }
    if config.rpc.addr.trim().is_empty() {
        config.rpc.addr = DEFAULT_RPC_ADDR.to_string();
    }
    if config.signing.round_timeout_secs == 0 {
        config.signing.round_timeout_secs = DEFAULT_ROUND_TIMEOUT_SECS;
    }
    if config.signing.join_window_secs == 0 {
        config.signing.join_window_secs = DEFAULT_JOIN_WINDOW_SECS;
    }
    if config.signing.signature_wait_secs == 0 {
        config.signing.signature_wait_secs = DEFAULT_SIGNATURE_WAIT_SECS;
    }
}

fn validate(config: &WardenConfig) -> Result<()> {
    if config.signing.signer_set.len() > MAX_SIGNERS {
        return Err(CustodyError::ConfigError(format!(
            "signing.signer_set has {} entries, max {}",
            config.signing.signer_set.len(),
            MAX_SIGNERS
        )));
    }
    if config.gossip.bootstrap_peers.len() > MAX_BOOTSTRAP_PEERS {
        return Err(CustodyError::ConfigError(format!(
            "gossip.bootstrap_peers has {} entries, max {}",
            config.gossip.bootstrap_peers.len(),
            MAX_BOOTSTRAP_PEERS
        )));
    }
    if let Some(secret) = config.gossip.secret_key.as_deref() {
        let trimmed = secret.trim().strip_prefix("0x").unwrap_or(secret.trim());
        let decoded = hex::decode(trimmed).map_err(|e| CustodyError::ConfigError(format!("invalid gossip.secret_key: {e}")))?;
        if decoded.len() != 32 {
            return Err(CustodyError::ConfigError(format!(
                "gossip.secret_key must be 32 bytes, got {}",
                decoded.len()
            )));
        }
    }
    let mut seen = std::collections::HashSet::new();
    for chain in &config.chains {
        if chain.chain_id.trim().is_empty() {
            return Err(CustodyError::ConfigError("chains entry with empty chain_id".to_string()));
        }
        if !seen.insert(chain.chain_id.as_str()) {
            return Err(CustodyError::ConfigError(format!("duplicate chains entry for {}", chain.chain_id)));
        }
    }
    Ok(())
}
