use crate::domain::curve::Curve;
use crate::foundation::{Identity, PayloadHash};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Strongly-typed key for every per-key map in the engine: the party
/// registry, the key-share store and the message inbox all index on this
/// triple.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
pub struct RoundKey {
    pub identity: Identity,
    pub identity_curve: Curve,
    pub key_curve: Curve,
}

impl RoundKey {
    pub fn new(identity: impl Into<Identity>, identity_curve: Curve, key_curve: Curve) -> Self {
        Self { identity: identity.into(), identity_curve, key_curve }
    }
}

impl fmt::Display for RoundKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.identity, self.identity_curve, self.key_curve)
    }
}

/// One generated key share. Created exactly once per round key by a
/// successful keygen round, immutable thereafter, never deleted by this
/// engine.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct KeyShareRecord {
    pub identity: Identity,
    pub identity_curve: Curve,
    pub key_curve: Curve,
    /// Serialized backend share (frost key package bytes or cait-sith
    /// keygen output JSON).
    #[serde(with = "hex_bytes")]
    pub share: Vec<u8>,
    /// Group public key bytes (32 for ed25519, 33 compressed for secp256k1).
    #[serde(with = "hex_bytes")]
    pub public_key: Vec<u8>,
    /// Peer public keys that participated in keygen, in the order given at
    /// request time. Party ordering is re-derived by sorting.
    pub signer_set: Vec<String>,
}

impl KeyShareRecord {
    pub fn round_key(&self) -> RoundKey {
        RoundKey { identity: self.identity.clone(), identity_curve: self.identity_curve, key_curve: self.key_curve }
    }
}

/// Outcome of one signing round, as handed back to the requester.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SignedPayload {
    /// Signature in the destination chain's transport encoding.
    pub signature: String,
    /// Signer address on the destination chain, derived from the stored
    /// public key.
    pub address: String,
    pub message_hash: PayloadHash,
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&hex::encode(bytes))
        } else {
            serializer.serialize_bytes(bytes)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            hex::decode(&s).map_err(serde::de::Error::custom)
        } else {
            Vec::<u8>::deserialize(deserializer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_key_display_is_triple() {
        let key = RoundKey::new("alice", Curve::Ecdsa, Curve::Eddsa);
        assert_eq!(key.to_string(), "alice/ecdsa/eddsa");
    }

    #[test]
    fn key_share_record_json_uses_hex_for_bytes() {
        let record = KeyShareRecord {
            identity: "alice".into(),
            identity_curve: Curve::Ecdsa,
            key_curve: Curve::Eddsa,
            share: vec![0xAB, 0xCD],
            public_key: vec![0x01; 32],
            signer_set: vec!["pkA".to_string()],
        };
        let json = serde_json::to_string(&record).expect("serialize");
        assert!(json.contains("\"abcd\""));
        let back: KeyShareRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.share, record.share);
    }
}
