use crate::foundation::CustodyError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Signature scheme identifier. Names both the identity-verification scheme
/// and the key-generation scheme; the two may differ for one identity.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Curve {
    Ecdsa,
    Eddsa,
}

impl Curve {
    pub fn as_str(&self) -> &'static str {
        match self {
            Curve::Ecdsa => "ecdsa",
            Curve::Eddsa => "eddsa",
        }
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Curve {
    type Err = CustodyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ecdsa" | "secp256k1" => Ok(Curve::Ecdsa),
            "eddsa" | "ed25519" => Ok(Curve::Eddsa),
            other => Err(CustodyError::ParseError(format!("unknown curve: {}", other))),
        }
    }
}
