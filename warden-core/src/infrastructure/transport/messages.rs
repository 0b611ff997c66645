use crate::domain::{Curve, RoundKey};
use crate::foundation::{ChainId, Identity, PayloadHash, PeerPubkey};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum MessageKind {
    /// A peer asks the whole signer set to start a keygen round.
    KeygenStart,
    /// One MPC round message of an in-flight keygen.
    KeygenRound,
    /// A peer asks the holders of a key share to start a signing round.
    SignStart,
    /// One MPC round message of an in-flight signing round.
    SignRound,
    /// Terminal broadcast carrying the encoded signature and signer address.
    SignatureResult,
}

/// Wire-level unit exchanged over the gossip topic. Immutable once sent.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ProtocolMessage {
    pub kind: MessageKind,
    /// 1-based party index of the sender; 0 for non-round messages.
    pub from: u32,
    /// 1-based party index of the recipient, -1 for broadcast.
    pub to: i32,
    pub is_broadcast: bool,
    pub payload: Vec<u8>,
    pub identity: Identity,
    pub identity_curve: Curve,
    pub key_curve: Curve,
    pub blockchain_id: Option<ChainId>,
    /// Blake3 hash of the signing payload, present on sign-round traffic.
    pub hash: Option<PayloadHash>,
    /// Signer address on the destination chain, present on results.
    pub address: Option<String>,
    pub signer_set: Vec<String>,
}

impl ProtocolMessage {
    pub fn round_key(&self) -> RoundKey {
        RoundKey { identity: self.identity.clone(), identity_curve: self.identity_curve, key_curve: self.key_curve }
    }

    pub fn is_addressed_to(&self, local_index: u32) -> bool {
        self.to == -1 || self.to == local_index as i32
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct MessageEnvelope {
    pub sender: PeerPubkey,
    pub seq_no: u64,
    pub timestamp_millis: u64,
    pub payload: ProtocolMessage,
    pub payload_hash: PayloadHash,
}
