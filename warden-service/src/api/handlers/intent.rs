use super::keys::parse_params;
use super::types::{json_err, json_ok, rpc_code_for, RpcErrorCode};
use crate::api::state::RpcState;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use warden_core::domain::encoding::algorand_signing_payload;
use warden_core::domain::{payload_for_operation, ChainFamily, ChainRegistry, Intent, SignedPayload};
use warden_core::foundation::RequestId;

#[derive(Debug, Deserialize)]
pub struct IntentSignParams {
    pub intent: Intent,
    pub operation_index: usize,
    /// Algorand only: marks the payload as real transaction bytes, which are
    /// domain-tagged before signing. Carried back alongside the signature.
    #[serde(default)]
    pub is_real_transaction: bool,
}

#[derive(Debug, Serialize)]
pub struct IntentSignResult {
    pub signature: String,
    pub address: String,
    pub message_hash: String,
    pub payload: String,
    pub is_real_transaction: bool,
}

/// Validates one operation of an intent, derives its payload, and runs a
/// threshold signing round for it.
pub async fn handle_intent_sign(state: &RpcState, id: serde_json::Value, params: Option<serde_json::Value>) -> serde_json::Value {
    let params: IntentSignParams = match parse_params("intent.sign", state, &id, params) {
        Ok(params) => params,
        Err(response) => return response,
    };
    let intent = params.intent;
    info!("rpc intent.sign intent={} op_index={} operations={}", intent.id, params.operation_index, intent.operations.len());

    let payload = match payload_for_operation(&intent, params.operation_index, &state.engine).await {
        Ok(payload) => payload,
        Err(err) => {
            state.metrics.inc_rpc_request("intent.sign", "error");
            warn!("rpc intent.sign rejected intent={} op_index={} err={}", intent.id, params.operation_index, err);
            return json_err(id, rpc_code_for(&err), err.to_string());
        }
    };

    // Index is in range: payload_for_operation validated it.
    let op = &intent.operations[params.operation_index];
    let payload = if ChainFamily::of(&op.blockchain_id) == ChainFamily::Algorand {
        algorand_signing_payload(&payload, params.is_real_transaction)
    } else {
        payload
    };
    let key_curve = match state.engine.chains.get(&op.blockchain_id) {
        Ok(chain) => chain.key_curve(),
        Err(err) => {
            state.metrics.inc_rpc_request("intent.sign", "error");
            return json_err(id, rpc_code_for(&err), err.to_string());
        }
    };

    state.metrics.inc_round("sign", "started");
    let signed = state
        .broker
        .request_signature(intent.identity.clone(), op.blockchain_id.clone(), intent.identity_curve, key_curve, &payload)
        .await;

    match signed {
        Ok(SignedPayload { signature, address, message_hash }) => {
            state.metrics.inc_round("sign", "completed");
            state.metrics.inc_signature();
            state.metrics.inc_rpc_request("intent.sign", "ok");
            info!("rpc intent.sign ok intent={} hash={} address={}", intent.id, message_hash, address);
            json_ok(
                id,
                IntentSignResult {
                    signature,
                    address,
                    message_hash: message_hash.to_string(),
                    payload,
                    is_real_transaction: params.is_real_transaction,
                },
            )
        }
        Err(err) => {
            state.metrics.inc_round("sign", "failed");
            state.metrics.inc_rpc_request("intent.sign", "error");
            warn!("rpc intent.sign failed intent={} err={}", intent.id, err);
            json_err(id, rpc_code_for(&err), err.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct IntentCancelParams {
    /// Hex request id as returned by the broker's pending list.
    pub request_id: String,
}

#[derive(Debug, Serialize)]
pub struct IntentCancelResult {
    pub cancelled: bool,
}

/// Stops the wait for one pending signature request. The signing round
/// itself keeps running for the rest of the group.
pub async fn handle_intent_cancel(state: &RpcState, id: serde_json::Value, params: Option<serde_json::Value>) -> serde_json::Value {
    let params: IntentCancelParams = match parse_params("intent.cancel", state, &id, params) {
        Ok(params) => params,
        Err(response) => return response,
    };
    let request_id: RequestId = match params.request_id.parse() {
        Ok(request_id) => request_id,
        Err(err) => {
            state.metrics.inc_rpc_request("intent.cancel", "error");
            return json_err(id, RpcErrorCode::InvalidParams, err.to_string());
        }
    };
    let cancelled = state.broker.cancel(&request_id);
    state.metrics.inc_rpc_request("intent.cancel", "ok");
    info!("rpc intent.cancel request_id={} cancelled={}", request_id, cancelled);
    json_ok(id, IntentCancelResult { cancelled })
}
