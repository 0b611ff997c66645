use std::fmt;

/// Hex formatter for arbitrary bytes in log messages.
///
/// `Display` (`{}`) prints lowercase hex without `0x` prefix; the alternate
/// form (`{:#x}`) adds the prefix.
#[derive(Clone, Copy)]
pub struct HexBytes<'a>(pub &'a [u8]);

pub fn hx(bytes: &[u8]) -> HexBytes<'_> {
    HexBytes(bytes)
}

fn fmt_lower_hex_bytes(bytes: &[u8], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if f.alternate() {
        f.write_str("0x")?;
    }
    for b in bytes {
        write!(f, "{:02x}", b)?;
    }
    Ok(())
}

impl fmt::Display for HexBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_lower_hex_bytes(self.0, f)
    }
}

impl fmt::LowerHex for HexBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_lower_hex_bytes(self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hx_display_matches_hex_encode() {
        let bytes = [0x00, 0x01, 0xFE, 0xFF];
        assert_eq!(format!("{}", hx(&bytes)), hex::encode(bytes));
        assert_eq!(format!("{:#x}", hx(&bytes)), format!("0x{}", hex::encode(bytes)));
    }
}
