use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque account identifier. Immutable once created; equality and
/// uniqueness are the only operations the engine relies on.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Principal([u8; 32]);

impl Principal {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Principal({}...)", &self.to_hex()[..8])
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_roundtrip() {
        let bytes = [7u8; 32];
        let p = Principal::from_bytes(bytes);
        assert_eq!(p.as_bytes(), &bytes);

        let hex = p.to_hex();
        let p2 = Principal::from_hex(&hex).unwrap();
        assert_eq!(p, p2);
    }

    #[test]
    fn test_principal_rejects_short_hex() {
        assert!(Principal::from_hex("abcd").is_err());
    }

    #[test]
    fn test_principal_debug_truncates() {
        let p = Principal::from_bytes([0xAB; 32]);
        assert_eq!(format!("{:?}", p), "Principal(abababab...)");
    }
}
