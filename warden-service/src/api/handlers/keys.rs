use super::types::{json_err, json_ok, rpc_code_for, RpcErrorCode};
use crate::api::state::RpcState;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use warden_core::domain::encoding::derive_address;
use warden_core::domain::{ChainFamily, Curve, RoundKey};
use warden_core::foundation::{ChainId, CustodyError, Identity};

#[derive(Debug, Deserialize)]
pub struct KeygenStartParams {
    pub identity: Identity,
    pub identity_curve: Curve,
    /// Gossip pubkeys of the signing group. Defaults to the node's
    /// configured signer set.
    #[serde(default)]
    pub signer_set: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct KeygenStartResult {
    pub identity: Identity,
    pub ecdsa_public_key: String,
    pub eddsa_public_key: String,
}

/// Generates both group keys for an identity, one keygen round per curve.
/// Re-running for an identity that already has shares returns the stored
/// public keys without new rounds.
pub async fn handle_keygen_start(state: &RpcState, id: serde_json::Value, params: Option<serde_json::Value>) -> serde_json::Value {
    let params: KeygenStartParams = match parse_params("keygen.start", state, &id, params) {
        Ok(params) => params,
        Err(response) => return response,
    };
    let signers = params.signer_set.unwrap_or_else(|| state.signer_set.clone());
    info!("rpc keygen.start identity={} identity_curve={} n={}", params.identity, params.identity_curve, signers.len());

    let ecdsa = state
        .coordinator
        .start_keygen(params.identity.clone(), params.identity_curve, Curve::Ecdsa, signers.clone(), true)
        .await;
    let ecdsa_public_key = match ecdsa {
        Ok(key) => {
            state.metrics.inc_round("keygen", "completed");
            hex::encode(key)
        }
        Err(err) => return keygen_failed(state, id, "ecdsa", err),
    };

    let eddsa = state
        .coordinator
        .start_keygen(params.identity.clone(), params.identity_curve, Curve::Eddsa, signers, true)
        .await;
    let eddsa_public_key = match eddsa {
        Ok(key) => {
            state.metrics.inc_round("keygen", "completed");
            hex::encode(key)
        }
        Err(err) => return keygen_failed(state, id, "eddsa", err),
    };

    state.metrics.inc_rpc_request("keygen.start", "ok");
    json_ok(id, KeygenStartResult { identity: params.identity, ecdsa_public_key, eddsa_public_key })
}

fn keygen_failed(state: &RpcState, id: serde_json::Value, curve: &str, err: CustodyError) -> serde_json::Value {
    state.metrics.inc_round("keygen", "failed");
    state.metrics.inc_rpc_request("keygen.start", "error");
    warn!("rpc keygen.start failed curve={} err={}", curve, err);
    json_err(id, rpc_code_for(&err), err.to_string())
}

#[derive(Debug, Deserialize)]
pub struct KeyAddressParams {
    pub identity: Identity,
    pub identity_curve: Curve,
    pub blockchain_id: ChainId,
}

#[derive(Debug, Serialize)]
pub struct KeyAddressResult {
    pub address: String,
    pub public_key: String,
    pub key_curve: Curve,
}

/// Derives the chain-native address of a stored group key.
pub async fn handle_key_address(state: &RpcState, id: serde_json::Value, params: Option<serde_json::Value>) -> serde_json::Value {
    let params: KeyAddressParams = match parse_params("key.address", state, &id, params) {
        Ok(params) => params,
        Err(response) => return response,
    };

    let result = key_address(state, &params);
    match result {
        Ok(result) => {
            state.metrics.inc_rpc_request("key.address", "ok");
            json_ok(id, result)
        }
        Err(err) => {
            state.metrics.inc_rpc_request("key.address", "error");
            warn!("rpc key.address failed identity={} chain={} err={}", params.identity, params.blockchain_id, err);
            json_err(id, rpc_code_for(&err), err.to_string())
        }
    }
}

fn key_address(state: &RpcState, params: &KeyAddressParams) -> Result<KeyAddressResult, CustodyError> {
    use warden_core::domain::ChainRegistry;
    let chain = state.engine.chains.get(&params.blockchain_id)?;
    let key_curve = chain.key_curve();
    let round_key = RoundKey::new(params.identity.clone(), params.identity_curve, key_curve);
    let record = state
        .coordinator
        .store()
        .get_share(&round_key)?
        .ok_or_else(|| CustodyError::KeyShareNotFound {
            identity: params.identity.to_string(),
            identity_curve: params.identity_curve.to_string(),
            key_curve: key_curve.to_string(),
        })?;
    let address = derive_address(ChainFamily::of(&params.blockchain_id), key_curve, &record.public_key)?;
    Ok(KeyAddressResult { address, public_key: hex::encode(&record.public_key), key_curve })
}

pub(super) fn parse_params<T: serde::de::DeserializeOwned>(
    method: &str,
    state: &RpcState,
    id: &serde_json::Value,
    params: Option<serde_json::Value>,
) -> Result<T, serde_json::Value> {
    let Some(params) = params else {
        state.metrics.inc_rpc_request(method, "error");
        warn!("rpc {} missing params", method);
        return Err(json_err(id.clone(), RpcErrorCode::InvalidParams, "missing params"));
    };
    serde_json::from_value(params).map_err(|err| {
        state.metrics.inc_rpc_request(method, "error");
        warn!("rpc {} invalid params err={}", method, err);
        json_err(id.clone(), RpcErrorCode::InvalidParams, err.to_string())
    })
}
