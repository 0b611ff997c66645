pub mod ecdsa;
pub mod eddsa;
pub mod traits;

pub use traits::{RoundAction, RoundOutcome, RoundSession};

use crate::foundation::util::encoding::decode_hex;
use crate::foundation::{CustodyError, Result};

/// Message handed to the EdDSA signer: the raw hash bytes, interpreted by the
/// backend as a big-endian integer.
pub fn eddsa_message_bytes(payload: &str) -> Result<Vec<u8>> {
    let bytes = decode_hex(payload)?;
    if bytes.is_empty() {
        return Err(CustodyError::InvalidOperation("empty signing payload".to_string()));
    }
    Ok(bytes)
}

/// Scalar handed to the ECDSA signer: the base-16 integer value of the
/// hex-encoded hash string, reduced into the secp256k1 scalar field.
///
/// Peers on other implementations derive the scalar the same way, so both
/// conversion paths must stay exactly as they are: EdDSA signs the raw hash
/// bytes, ECDSA signs the integer parsed from the hex string.
pub fn ecdsa_message_scalar(payload: &str) -> Result<k256::Scalar> {
    use k256::elliptic_curve::ops::Reduce;
    let bytes = decode_hex(payload)?;
    if bytes.is_empty() || bytes.len() > 32 {
        return Err(CustodyError::InvalidOperation(format!("signing payload must be 1..=32 bytes, got {}", bytes.len())));
    }
    let mut padded = [0u8; 32];
    padded[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(<k256::Scalar as Reduce<k256::U256>>::reduce(k256::U256::from_be_slice(&padded)))
}
