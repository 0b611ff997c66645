use crate::domain::curve::Curve;
use crate::foundation::util::encoding::decode_hex;
use crate::foundation::util::time::now_secs;
use crate::foundation::{ChainId, CustodyError, Identity, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One step of an intent. The operation's position inside the intent encodes
/// its sequencing constraints.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Transaction,
    SendToBridge,
    Solver,
    BridgeDeposit,
    Swap,
    Burn,
    BurnSynthetic,
    Withdraw,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Transaction => "transaction",
            OperationKind::SendToBridge => "send_to_bridge",
            OperationKind::Solver => "solver",
            OperationKind::BridgeDeposit => "bridge_deposit",
            OperationKind::Swap => "swap",
            OperationKind::Burn => "burn",
            OperationKind::BurnSynthetic => "burn_synthetic",
            OperationKind::Withdraw => "withdraw",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

/// Structured solver metadata consumed by the sequencing engine.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct OperationMetadata {
    /// Deposit transaction hash, when already known to the solver.
    #[serde(default)]
    pub transaction_hash: Option<String>,
    /// Token address this operation burns/withdraws/deposits.
    #[serde(default)]
    pub token: Option<String>,
    /// Amount in the token's smallest unit.
    #[serde(default)]
    pub amount: Option<u128>,
    /// Destination address the serialized transaction pays to.
    #[serde(default)]
    pub destination: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Operation {
    pub id: String,
    pub kind: OperationKind,
    pub blockchain_id: ChainId,
    #[serde(default)]
    pub network_type: String,
    #[serde(default)]
    pub data_to_sign: Option<String>,
    #[serde(default)]
    pub serialized_txn: Option<String>,
    #[serde(default)]
    pub solver: Option<String>,
    #[serde(default)]
    pub solver_metadata: OperationMetadata,
    #[serde(default)]
    pub solver_data_to_sign: Option<String>,
    #[serde(default)]
    pub status: OperationStatus,
    /// Transaction hash once the operation has been executed on-chain.
    #[serde(default)]
    pub result: Option<String>,
}

/// A signed, ordered list of operations representing one cross-chain
/// request. Authorized as a whole by `signature` over the canonical
/// serialization, independent of any one operation's payload.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Intent {
    pub id: String,
    pub identity: Identity,
    pub identity_curve: Curve,
    pub blockchain_id: ChainId,
    #[serde(default)]
    pub network_type: String,
    /// Hex signature over `canonical_bytes()` by the identity key.
    pub signature: String,
    /// Unix seconds; zero means no expiry.
    #[serde(default)]
    pub expiry: u64,
    pub operations: Vec<Operation>,
}

impl Intent {
    /// Canonical serialization for signature verification: JSON with
    /// recursively sorted object keys and the top-level `signature` field
    /// removed. Whitespace-free, so every node derives identical bytes.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            map.remove("signature");
        }
        let mut out = Vec::new();
        write_canonical(&value, &mut out);
        Ok(out)
    }

    pub fn check_expiry(&self) -> Result<()> {
        let now = now_secs();
        if self.expiry != 0 && self.expiry < now {
            return Err(CustodyError::IntentExpired { expired_at: self.expiry, current_time: now });
        }
        Ok(())
    }

    /// Verifies `signature` against the canonical serialization using the
    /// identity's declared curve. The identity string is the hex public key
    /// (32-byte ed25519 or 33-byte compressed secp256k1).
    pub fn verify_signature(&self) -> Result<()> {
        let message = self.canonical_bytes()?;
        let signature = decode_hex(&self.signature)?;
        match self.identity_curve {
            Curve::Eddsa => {
                use ed25519_dalek::{Signature, Verifier, VerifyingKey};
                let pk_bytes: [u8; 32] = decode_hex(&self.identity)?
                    .as_slice()
                    .try_into()
                    .map_err(|_| CustodyError::InvalidPublicKey {
                        input: self.identity.to_string(),
                        reason: "expected 32-byte ed25519 public key".to_string(),
                    })?;
                let key = VerifyingKey::from_bytes(&pk_bytes).map_err(|e| CustodyError::InvalidPublicKey {
                    input: self.identity.to_string(),
                    reason: e.to_string(),
                })?;
                let sig = Signature::from_slice(&signature).map_err(|_| CustodyError::IntentSignatureInvalid)?;
                key.verify(&message, &sig).map_err(|_| CustodyError::IntentSignatureInvalid)
            }
            Curve::Ecdsa => {
                use k256::ecdsa::signature::Verifier;
                use k256::ecdsa::{Signature, VerifyingKey};
                let pk_bytes = decode_hex(&self.identity)?;
                let key = VerifyingKey::from_sec1_bytes(&pk_bytes).map_err(|e| CustodyError::InvalidPublicKey {
                    input: self.identity.to_string(),
                    reason: e.to_string(),
                })?;
                let sig = Signature::from_slice(&signature).map_err(|_| CustodyError::IntentSignatureInvalid)?;
                key.verify(&message, &sig).map_err(|_| CustodyError::IntentSignatureInvalid)
            }
        }
    }
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Object(map) => {
            out.push(b'{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                // Keys come from serde field names, always plain strings.
                out.extend_from_slice(serde_json::to_string(key).unwrap_or_default().as_bytes());
                out.push(b':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out);
            }
            out.push(b']');
        }
        other => {
            out.extend_from_slice(serde_json::to_string(other).unwrap_or_default().as_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_intent() -> Intent {
        Intent {
            id: "intent-1".to_string(),
            identity: "alice".into(),
            identity_curve: Curve::Eddsa,
            blockchain_id: "solana".into(),
            network_type: "mainnet".to_string(),
            signature: "00".to_string(),
            expiry: 0,
            operations: vec![Operation {
                id: "op-0".to_string(),
                kind: OperationKind::Transaction,
                blockchain_id: "solana".into(),
                network_type: "mainnet".to_string(),
                data_to_sign: Some("deadbeef".to_string()),
                serialized_txn: None,
                solver: None,
                solver_metadata: OperationMetadata::default(),
                solver_data_to_sign: None,
                status: OperationStatus::Pending,
                result: None,
            }],
        }
    }

    #[test]
    fn canonical_bytes_excludes_signature_and_sorts_keys() {
        let mut intent = sample_intent();
        let a = intent.canonical_bytes().expect("canonical");
        intent.signature = "ffff".to_string();
        let b = intent.canonical_bytes().expect("canonical");
        assert_eq!(a, b);

        let text = String::from_utf8(a).expect("utf8");
        assert!(!text.contains("signature"));
        // keys of the top-level object appear in sorted order
        let id_pos = text.find("\"id\"").expect("id key");
        let ops_pos = text.find("\"operations\"").expect("operations key");
        assert!(id_pos < ops_pos);
    }

    #[test]
    fn canonical_form_sorts_nested_object_keys() {
        let value: Value = serde_json::from_str(r#"{"b":{"z":1,"a":[2,{"y":3,"x":4}]},"a":"v"}"#).expect("json");
        let mut out = Vec::new();
        write_canonical(&value, &mut out);
        assert_eq!(String::from_utf8(out).expect("utf8"), r#"{"a":"v","b":{"a":[2,{"x":4,"y":3}],"z":1}}"#);
    }

    #[test]
    fn expired_intent_rejected() {
        let mut intent = sample_intent();
        intent.expiry = 1;
        assert!(matches!(intent.check_expiry(), Err(CustodyError::IntentExpired { .. })));
        intent.expiry = 0;
        assert!(intent.check_expiry().is_ok());
    }

    #[test]
    fn eddsa_intent_signature_round_trip() {
        use ed25519_dalek::{Signer, SigningKey};
        let sk = SigningKey::from_bytes(&[7u8; 32]);
        let mut intent = sample_intent();
        intent.identity = hex::encode(sk.verifying_key().as_bytes()).into();
        let sig = sk.sign(&intent.canonical_bytes().expect("canonical"));
        intent.signature = hex::encode(sig.to_bytes());
        intent.verify_signature().expect("verify");

        intent.operations[0].data_to_sign = Some("feedface".to_string());
        assert!(matches!(intent.verify_signature(), Err(CustodyError::IntentSignatureInvalid)));
    }

    #[test]
    fn ecdsa_intent_signature_round_trip() {
        use k256::ecdsa::{signature::Signer, Signature, SigningKey};
        let sk = SigningKey::from_bytes((&[9u8; 32]).into()).expect("key");
        let mut intent = sample_intent();
        intent.identity_curve = Curve::Ecdsa;
        intent.identity = hex::encode(sk.verifying_key().to_sec1_bytes()).into();
        let sig: Signature = sk.sign(&intent.canonical_bytes().expect("canonical"));
        intent.signature = hex::encode(sig.to_bytes());
        intent.verify_signature().expect("verify");
    }
}
