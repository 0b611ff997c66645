use crate::foundation::{CustodyError, Hash32};

pub fn decode_hex(s: &str) -> Result<Vec<u8>, CustodyError> {
    hex::decode(s.strip_prefix("0x").unwrap_or(s)).map_err(|e| e.into())
}

pub fn parse_hex_32bytes(s: &str) -> Result<Hash32, CustodyError> {
    let bytes = decode_hex(s)?;
    let arr: Hash32 = bytes
        .as_slice()
        .try_into()
        .map_err(|_| CustodyError::EncodingError(format!("expected 32 bytes, got {}", bytes.len())))?;
    Ok(arr)
}
