use serde::{Deserialize, Serialize};
use warden_core::foundation::{CustodyError, ErrorCode};

#[repr(i64)]
#[derive(Clone, Copy, Debug)]
pub enum RpcErrorCode {
    ParseError = -32700,
    InvalidRequest = -32600,
    MethodNotFound = -32601,
    InvalidParams = -32602,
    InternalError = -32603,
    Unauthorized = -32001,
    DeadlineExceeded = -32002,
    RoundInProgress = -32003,
    Cancelled = -32004,
    SigningFailed = -32005,
}

/// Maps engine errors onto wire codes. Intent authorization failures are
/// `Unauthorized`; precondition and lookup failures are `InvalidParams`;
/// everything that happens after a round started is `SigningFailed`.
pub fn rpc_code_for(err: &CustodyError) -> RpcErrorCode {
    match err.code() {
        ErrorCode::IntentSignatureInvalid | ErrorCode::IntentExpired => RpcErrorCode::Unauthorized,
        ErrorCode::SignerSetEmpty
        | ErrorCode::TooManySigners
        | ErrorCode::NotInSignerSet
        | ErrorCode::KeyShareNotFound
        | ErrorCode::MissingPredecessor
        | ErrorCode::MissingField
        | ErrorCode::InvalidOperation
        | ErrorCode::TokenMismatch
        | ErrorCode::TokenNotRegistered
        | ErrorCode::DestinationNotAllowed
        | ErrorCode::InsufficientBridgeBalance
        | ErrorCode::UnsupportedChain
        | ErrorCode::UnsupportedCurve
        | ErrorCode::InvalidPublicKey
        | ErrorCode::ParseError
        | ErrorCode::ConfigError => RpcErrorCode::InvalidParams,
        ErrorCode::DeadlineExceeded | ErrorCode::RoundTimeout => RpcErrorCode::DeadlineExceeded,
        ErrorCode::RoundInProgress => RpcErrorCode::RoundInProgress,
        ErrorCode::Cancelled => RpcErrorCode::Cancelled,
        _ => RpcErrorCode::SigningFailed,
    }
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: Option<String>,
    pub id: serde_json::Value,
    pub method: String,
    pub params: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse<T> {
    pub jsonrpc: &'static str,
    pub id: serde_json::Value,
    pub result: T,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub jsonrpc: &'static str,
    pub id: serde_json::Value,
    pub error: JsonRpcErrorBody,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcErrorBody {
    pub code: i64,
    pub message: String,
}

pub fn json_ok<T: Serialize>(id: serde_json::Value, result: T) -> serde_json::Value {
    serde_json::to_value(JsonRpcResponse { jsonrpc: "2.0", id, result }).unwrap_or(serde_json::Value::Null)
}

pub fn json_err(id: serde_json::Value, code: RpcErrorCode, message: impl Into<String>) -> serde_json::Value {
    serde_json::to_value(JsonRpcError { jsonrpc: "2.0", id, error: JsonRpcErrorBody { code: code as i64, message: message.into() } })
        .unwrap_or(serde_json::Value::Null)
}
