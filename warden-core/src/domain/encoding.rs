//! Per-chain address derivation and signature encoding. Addresses are a pure
//! function of the stored public key, recomputed at signature-emission time.

use crate::domain::chain::ChainFamily;
use crate::domain::curve::Curve;
use crate::foundation::{CustodyError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use blake2::digest::consts::U32;
use blake2::Blake2b;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256, Sha512_256};
use sha3::Keccak256;

const ED25519_FLAG_SUI: u8 = 0x00;
const VERSION_P2PKH_BITCOIN: u8 = 0x00;
const VERSION_P2PKH_DOGECOIN: u8 = 0x1e;
const VERSION_ACCOUNT_RIPPLE: u8 = 0x00;
// StrKey version byte for account ids: 'G' once base32-encoded.
const VERSION_ACCOUNT_STELLAR: u8 = 6 << 3;

/// Signer address on a chain, derived from the group public key.
pub fn derive_address(family: ChainFamily, key_curve: Curve, public_key: &[u8]) -> Result<String> {
    match family {
        ChainFamily::Evm => evm_address_from_pubkey(public_key),
        ChainFamily::Bitcoin => Ok(base58check(VERSION_P2PKH_BITCOIN, &hash160(public_key), bs58::Alphabet::BITCOIN)),
        ChainFamily::Dogecoin => Ok(base58check(VERSION_P2PKH_DOGECOIN, &hash160(public_key), bs58::Alphabet::BITCOIN)),
        ChainFamily::Solana => Ok(bs58::encode(public_key).into_string()),
        ChainFamily::Sui => {
            let mut hasher = Blake2b::<U32>::new();
            hasher.update([ED25519_FLAG_SUI]);
            hasher.update(public_key);
            Ok(format!("0x{}", hex::encode(hasher.finalize())))
        }
        ChainFamily::Aptos | ChainFamily::Cardano => Ok(hex::encode(public_key)),
        ChainFamily::Ripple => Ok(base58check(VERSION_ACCOUNT_RIPPLE, &hash160(public_key), bs58::Alphabet::RIPPLE)),
        ChainFamily::Stellar => {
            let mut payload = Vec::with_capacity(35);
            payload.push(VERSION_ACCOUNT_STELLAR);
            payload.extend_from_slice(public_key);
            let crc = crc16_xmodem(&payload);
            payload.extend_from_slice(&crc.to_le_bytes());
            Ok(data_encoding::BASE32_NOPAD.encode(&payload))
        }
        ChainFamily::Algorand => {
            let checksum = Sha512_256::digest(public_key);
            let mut payload = Vec::with_capacity(36);
            payload.extend_from_slice(public_key);
            payload.extend_from_slice(&checksum[28..]);
            Ok(data_encoding::BASE32_NOPAD.encode(&payload))
        }
        ChainFamily::Other => match key_curve {
            Curve::Ecdsa => evm_address_from_pubkey(public_key),
            Curve::Eddsa => Ok(hex::encode(public_key)),
        },
    }
}

/// Transport encoding for a raw signature on a chain.
pub fn encode_signature(family: ChainFamily, signature: &[u8], public_key: &[u8]) -> Result<String> {
    match family {
        ChainFamily::Solana => Ok(bs58::encode(signature).into_string()),
        ChainFamily::Sui => {
            let mut serialized = Vec::with_capacity(1 + signature.len() + public_key.len());
            serialized.push(ED25519_FLAG_SUI);
            serialized.extend_from_slice(signature);
            serialized.extend_from_slice(public_key);
            Ok(BASE64.encode(serialized))
        }
        ChainFamily::Stellar | ChainFamily::Algorand => Ok(BASE64.encode(signature)),
        ChainFamily::Evm
        | ChainFamily::Bitcoin
        | ChainFamily::Dogecoin
        | ChainFamily::Aptos
        | ChainFamily::Ripple
        | ChainFamily::Cardano
        | ChainFamily::Other => Ok(hex::encode(signature)),
    }
}

/// Chain encoding for a threshold ECDSA signature. Runs public-key recovery
/// over `(prehash, r‖s)` as a self-check against the stored group key before
/// the signature leaves the node; EVM transports carry the recovery id as a
/// trailing `v` byte.
pub fn encode_ecdsa_signature(family: ChainFamily, signature: &[u8], public_key: &[u8], prehash: &[u8]) -> Result<String> {
    let v = recovery_id_for(public_key, prehash, signature)?;
    match family {
        ChainFamily::Evm => {
            let mut out = Vec::with_capacity(signature.len() + 1);
            out.extend_from_slice(signature);
            out.push(v);
            Ok(hex::encode(out))
        }
        _ => encode_signature(family, signature, public_key),
    }
}

/// Algorand tags real transaction bytes with a `"TX"` domain prefix before
/// signing; arbitrary payloads are signed as-is. The flag travels out of band
/// next to the raw message so verifiers apply the same treatment.
pub const ALGORAND_TRANSACTION_TAG: &[u8] = b"TX";

pub fn algorand_signing_payload(payload_hex: &str, is_real_transaction: bool) -> String {
    if is_real_transaction {
        format!("{}{}", hex::encode(ALGORAND_TRANSACTION_TAG), payload_hex)
    } else {
        payload_hex.to_string()
    }
}

/// EVM address: keccak256 of the uncompressed public key body, last 20 bytes.
pub fn evm_address_from_pubkey(public_key: &[u8]) -> Result<String> {
    use k256::ecdsa::VerifyingKey;
    let key = VerifyingKey::from_sec1_bytes(public_key).map_err(|e| CustodyError::InvalidPublicKey {
        input: hex::encode(public_key),
        reason: e.to_string(),
    })?;
    let uncompressed = key.to_encoded_point(false);
    let digest = Keccak256::digest(&uncompressed.as_bytes()[1..]);
    Ok(format!("0x{}", hex::encode(&digest[12..])))
}

/// Recovers the EVM address from `(hash, r||s, v)` via public-key recovery.
pub fn recover_evm_address(prehash: &[u8], rs: &[u8], v: u8) -> Result<String> {
    use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
    let signature = Signature::from_slice(rs)
        .map_err(|e| CustodyError::CryptoError { operation: "ecdsa recover".to_string(), details: e.to_string() })?;
    let recovery = RecoveryId::from_byte(v)
        .ok_or_else(|| CustodyError::CryptoError { operation: "ecdsa recover".to_string(), details: format!("bad recovery id {}", v) })?;
    let key = VerifyingKey::recover_from_prehash(prehash, &signature, recovery)
        .map_err(|e| CustodyError::CryptoError { operation: "ecdsa recover".to_string(), details: e.to_string() })?;
    evm_address_from_pubkey(&key.to_sec1_bytes())
}

/// Finds the recovery id that maps `(prehash, r||s)` back to `public_key`.
/// Used as a self-check that the produced signature is consistent with the
/// expected signer.
pub fn recovery_id_for(public_key: &[u8], prehash: &[u8], rs: &[u8]) -> Result<u8> {
    use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
    let expected = VerifyingKey::from_sec1_bytes(public_key).map_err(|e| CustodyError::InvalidPublicKey {
        input: hex::encode(public_key),
        reason: e.to_string(),
    })?;
    let signature = Signature::from_slice(rs)
        .map_err(|e| CustodyError::CryptoError { operation: "ecdsa recover".to_string(), details: e.to_string() })?;
    for byte in 0..=1u8 {
        let recovery = match RecoveryId::from_byte(byte) {
            Some(r) => r,
            None => continue,
        };
        if let Ok(key) = VerifyingKey::recover_from_prehash(prehash, &signature, recovery) {
            if key == expected {
                return Ok(byte);
            }
        }
    }
    Err(CustodyError::SigningFailed("signature does not recover to the stored public key".to_string()))
}

fn hash160(public_key: &[u8]) -> [u8; 20] {
    Ripemd160::digest(Sha256::digest(public_key)).into()
}

fn base58check(version: u8, payload: &[u8], alphabet: &bs58::Alphabet) -> String {
    let mut data = Vec::with_capacity(1 + payload.len() + 4);
    data.push(version);
    data.extend_from_slice(payload);
    let checksum = Sha256::digest(Sha256::digest(&data));
    data.extend_from_slice(&checksum[..4]);
    bs58::encode(data).with_alphabet(alphabet).into_string()
}

fn crc16_xmodem(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}
