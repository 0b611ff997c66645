use std::io;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    IntentSignatureInvalid,
    IntentExpired,
    SignerSetEmpty,
    TooManySigners,
    NotInSignerSet,
    KeyShareNotFound,
    KeyShareConflict,
    RoundInProgress,
    RoundFailed,
    RoundTimeout,
    DeadlineExceeded,
    Cancelled,
    SigningFailed,
    ProtocolViolation,
    MissingPredecessor,
    MissingField,
    InvalidOperation,
    TokenMismatch,
    TokenNotRegistered,
    DestinationNotAllowed,
    InsufficientBridgeBalance,
    UnsupportedChain,
    UnsupportedCurve,
    InvalidPublicKey,
    InvalidPeerIdentity,
    StorageError,
    SerializationError,
    CryptoError,
    TransportError,
    KeyNotFound,
    ConfigError,
    NodeRpcError,
    Unimplemented,
    MessageTooLarge,
    EncodingError,
    NetworkError,
    MetricsError,
    ParseError,
    Message,
}

#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum CustodyError {
    #[error("intent signature verification failed")]
    IntentSignatureInvalid,

    #[error("intent expired at {expired_at}, current time {current_time}")]
    IntentExpired { expired_at: u64, current_time: u64 },

    #[error("signer set is empty")]
    SignerSetEmpty,

    #[error("signer set has {count} members, max {max}")]
    TooManySigners { count: usize, max: usize },

    #[error("local peer {peer} not in signer set")]
    NotInSignerSet { peer: String },

    #[error("no key share for identity={identity} identity_curve={identity_curve} key_curve={key_curve}")]
    KeyShareNotFound { identity: String, identity_curve: String, key_curve: String },

    #[error("key share already exists for identity={identity} key_curve={key_curve}")]
    KeyShareConflict { identity: String, key_curve: String },

    #[error("round already in progress for {round_key}")]
    RoundInProgress { round_key: String },

    #[error("round failed: {0}")]
    RoundFailed(String),

    #[error("round timed out after {elapsed_secs}s")]
    RoundTimeout { elapsed_secs: u64 },

    #[error("signature wait deadline exceeded after {waited_secs}s")]
    DeadlineExceeded { waited_secs: u64 },

    #[error("signature request cancelled")]
    Cancelled,

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("protocol violation from party {from}: {details}")]
    ProtocolViolation { from: u32, details: String },

    #[error("operation {index} requires a preceding {expected} operation")]
    MissingPredecessor { index: usize, expected: String },

    #[error("operation {index} missing required field {field}")]
    MissingField { index: usize, field: String },

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("withdraw token {requested} does not match burned token {burned}")]
    TokenMismatch { burned: String, requested: String },

    #[error("token not registered with bridge: {0}")]
    TokenNotRegistered(String),

    #[error("destination not allowed: {0}")]
    DestinationNotAllowed(String),

    #[error("bridge wallet balance {balance} below required {required}")]
    InsufficientBridgeBalance { balance: u128, required: u128 },

    #[error("unsupported chain: {0}")]
    UnsupportedChain(String),

    #[error("unsupported curve {curve} for {context}")]
    UnsupportedCurve { curve: String, context: String },

    #[error("invalid public key: input={input} reason={reason}")]
    InvalidPublicKey { input: String, reason: String },

    #[error("invalid peer identity")]
    InvalidPeerIdentity,

    #[error("storage error during {operation}: {details}")]
    StorageError { operation: String, details: String },

    #[error("{format} serialization error: {details}")]
    SerializationError { format: String, details: String },

    #[error("crypto error during {operation}: {details}")]
    CryptoError { operation: String, details: String },

    #[error("transport error during {operation}: {details}")]
    TransportError { operation: String, details: String },

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("node RPC error: {0}")]
    NodeRpcError(String),

    #[error("feature not implemented: {0}")]
    Unimplemented(String),

    #[error("message too large: {size} exceeds max {max}")]
    MessageTooLarge { size: usize, max: usize },

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("metrics error during {operation}: {details}")]
    MetricsError { operation: String, details: String },

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("{0}")]
    Message(String),
}

pub type Result<T> = std::result::Result<T, CustodyError>;

impl CustodyError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CustodyError::IntentSignatureInvalid => ErrorCode::IntentSignatureInvalid,
            CustodyError::IntentExpired { .. } => ErrorCode::IntentExpired,
            CustodyError::SignerSetEmpty => ErrorCode::SignerSetEmpty,
            CustodyError::TooManySigners { .. } => ErrorCode::TooManySigners,
            CustodyError::NotInSignerSet { .. } => ErrorCode::NotInSignerSet,
            CustodyError::KeyShareNotFound { .. } => ErrorCode::KeyShareNotFound,
            CustodyError::KeyShareConflict { .. } => ErrorCode::KeyShareConflict,
            CustodyError::RoundInProgress { .. } => ErrorCode::RoundInProgress,
            CustodyError::RoundFailed(_) => ErrorCode::RoundFailed,
            CustodyError::RoundTimeout { .. } => ErrorCode::RoundTimeout,
            CustodyError::DeadlineExceeded { .. } => ErrorCode::DeadlineExceeded,
            CustodyError::Cancelled => ErrorCode::Cancelled,
            CustodyError::SigningFailed(_) => ErrorCode::SigningFailed,
            CustodyError::ProtocolViolation { .. } => ErrorCode::ProtocolViolation,
            CustodyError::MissingPredecessor { .. } => ErrorCode::MissingPredecessor,
            CustodyError::MissingField { .. } => ErrorCode::MissingField,
            CustodyError::InvalidOperation(_) => ErrorCode::InvalidOperation,
            CustodyError::TokenMismatch { .. } => ErrorCode::TokenMismatch,
            CustodyError::TokenNotRegistered(_) => ErrorCode::TokenNotRegistered,
            CustodyError::DestinationNotAllowed(_) => ErrorCode::DestinationNotAllowed,
            CustodyError::InsufficientBridgeBalance { .. } => ErrorCode::InsufficientBridgeBalance,
            CustodyError::UnsupportedChain(_) => ErrorCode::UnsupportedChain,
            CustodyError::UnsupportedCurve { .. } => ErrorCode::UnsupportedCurve,
            CustodyError::InvalidPublicKey { .. } => ErrorCode::InvalidPublicKey,
            CustodyError::InvalidPeerIdentity => ErrorCode::InvalidPeerIdentity,
            CustodyError::StorageError { .. } => ErrorCode::StorageError,
            CustodyError::SerializationError { .. } => ErrorCode::SerializationError,
            CustodyError::CryptoError { .. } => ErrorCode::CryptoError,
            CustodyError::TransportError { .. } => ErrorCode::TransportError,
            CustodyError::KeyNotFound(_) => ErrorCode::KeyNotFound,
            CustodyError::ConfigError(_) => ErrorCode::ConfigError,
            CustodyError::NodeRpcError(_) => ErrorCode::NodeRpcError,
            CustodyError::Unimplemented(_) => ErrorCode::Unimplemented,
            CustodyError::MessageTooLarge { .. } => ErrorCode::MessageTooLarge,
            CustodyError::EncodingError(_) => ErrorCode::EncodingError,
            CustodyError::NetworkError(_) => ErrorCode::NetworkError,
            CustodyError::MetricsError { .. } => ErrorCode::MetricsError,
            CustodyError::ParseError(_) => ErrorCode::ParseError,
            CustodyError::Message(_) => ErrorCode::Message,
        }
    }

    pub fn context(&self) -> ErrorContext {
        ErrorContext { code: self.code(), message: self.to_string() }
    }
}

impl From<hex::FromHexError> for CustodyError {
    fn from(err: hex::FromHexError) -> Self {
        CustodyError::EncodingError(format!("hex decode error: {}", err))
    }
}

impl From<toml::de::Error> for CustodyError {
    fn from(err: toml::de::Error) -> Self {
        CustodyError::ConfigError(format!("TOML parsing error: {}", err))
    }
}

impl From<bincode::Error> for CustodyError {
    fn from(err: bincode::Error) -> Self {
        CustodyError::SerializationError { format: "bincode".to_string(), details: err.to_string() }
    }
}

impl From<io::Error> for CustodyError {
    fn from(err: io::Error) -> Self {
        CustodyError::StorageError { operation: "io".to_string(), details: err.to_string() }
    }
}

impl From<serde_json::Error> for CustodyError {
    fn from(err: serde_json::Error) -> Self {
        CustodyError::SerializationError { format: "json".to_string(), details: err.to_string() }
    }
}

impl From<frost_ed25519::Error> for CustodyError {
    fn from(err: frost_ed25519::Error) -> Self {
        CustodyError::CryptoError { operation: "frost-ed25519".to_string(), details: err.to_string() }
    }
}

impl From<cait_sith::protocol::ProtocolError> for CustodyError {
    fn from(err: cait_sith::protocol::ProtocolError) -> Self {
        CustodyError::CryptoError { operation: "cait-sith".to_string(), details: err.to_string() }
    }
}

impl From<cait_sith::protocol::InitializationError> for CustodyError {
    fn from(err: cait_sith::protocol::InitializationError) -> Self {
        CustodyError::CryptoError { operation: "cait-sith init".to_string(), details: err.to_string() }
    }
}

#[macro_export]
macro_rules! storage_err {
    ($op:expr, $err:expr) => {
        $crate::foundation::CustodyError::StorageError { operation: $op.into(), details: $err.to_string() }
    };
}

#[macro_export]
macro_rules! serde_err {
    ($fmt:expr, $err:expr) => {
        $crate::foundation::CustodyError::SerializationError { format: $fmt.into(), details: $err.to_string() }
    };
}

// NOTE: Avoid adding generic "stringly" error conversions here.
// Use structured `CustodyError` variants at the call site to preserve context.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_variants_render() {
        let err = CustodyError::TooManySigners { count: 31, max: 30 };
        assert!(err.to_string().contains("max 30"));

        let err = CustodyError::MissingPredecessor { index: 2, expected: "burn".to_string() };
        assert!(err.to_string().contains("preceding burn"));

        let err = CustodyError::DeadlineExceeded { waited_secs: 300 };
        assert_eq!(err.code(), ErrorCode::DeadlineExceeded);

        let err = CustodyError::TokenMismatch { burned: "usdc".to_string(), requested: "usdt".to_string() };
        assert!(err.to_string().contains("usdc"));
    }
}
