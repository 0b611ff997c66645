use super::messages::{MessageEnvelope, ProtocolMessage};
use crate::foundation::{CustodyError, PayloadHash, MAX_MESSAGE_SIZE_BYTES};
use bincode::Options;

const WIRE_PROTOCOL_VERSION_V1: u16 = 1;

pub fn encode_envelope(envelope: &MessageEnvelope) -> Result<Vec<u8>, CustodyError> {
    let mut out = Vec::new();
    out.extend_from_slice(&WIRE_PROTOCOL_VERSION_V1.to_le_bytes());
    let bytes =
        bincode::DefaultOptions::new().with_fixint_encoding().serialize(envelope).map_err(|err| crate::serde_err!("bincode", err))?;
    out.extend_from_slice(&bytes);
    if out.len() > MAX_MESSAGE_SIZE_BYTES {
        return Err(CustodyError::MessageTooLarge { size: out.len(), max: MAX_MESSAGE_SIZE_BYTES });
    }
    Ok(out)
}

pub fn decode_envelope(bytes: &[u8]) -> Result<MessageEnvelope, CustodyError> {
    if bytes.len() < 2 {
        return Err(CustodyError::NetworkError("gossip message too short".to_string()));
    }
    let version = u16::from_le_bytes([bytes[0], bytes[1]]);
    if version != WIRE_PROTOCOL_VERSION_V1 {
        return Err(CustodyError::NetworkError(format!(
            "wire protocol version mismatch: expected {WIRE_PROTOCOL_VERSION_V1}, got {version}"
        )));
    }
    bincode::DefaultOptions::new().with_fixint_encoding().deserialize(&bytes[2..]).map_err(|err| crate::serde_err!("bincode", err))
}

pub fn payload_hash(payload: &ProtocolMessage) -> Result<PayloadHash, CustodyError> {
    let bytes =
        bincode::DefaultOptions::new().with_fixint_encoding().serialize(payload).map_err(|err| crate::serde_err!("bincode", err))?;
    Ok(PayloadHash::from(*blake3::hash(&bytes).as_bytes()))
}
