//! Account and contract identities.
//!
//! An [`Address`] is a 20-byte identity written as `0x`-prefixed hex. It is
//! used both for participants (reporters, validators, the owner) and for the
//! target contracts being reported against.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{LedgerError, Result};

/// Number of bytes in an address.
pub const ADDRESS_LEN: usize = 20;

/// A 20-byte account or contract identity.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// The zero address. Never a valid report target.
    pub const ZERO: Self = Self([0; ADDRESS_LEN]);

    /// Create an address from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Create an address from a byte slice.
    ///
    /// # Errors
    ///
    /// Returns error if the slice is not exactly 20 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; ADDRESS_LEN] = bytes.try_into().map_err(|_| {
            LedgerError::invalid_address(format!(
                "address must be {ADDRESS_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    /// Parse a hex address, with or without the `0x` prefix.
    ///
    /// # Errors
    ///
    /// Returns error if the text is not 40 hex digits.
    pub fn from_hex(s: &str) -> Result<Self> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if digits.len() != ADDRESS_LEN * 2 {
            return Err(LedgerError::invalid_address(format!(
                "expected {} hex digits, got {}",
                ADDRESS_LEN * 2,
                digits.len()
            )));
        }
        let bytes = hex::decode(digits)
            .map_err(|e| LedgerError::invalid_address(format!("invalid hex: {e}")))?;
        Self::from_slice(&bytes)
    }

    /// Raw bytes of the address.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Returns true for the zero address.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0; ADDRESS_LEN]
    }

    /// Lowercase `0x`-prefixed hex form.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s.trim())
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "0x52908400098527886e0f7030069857d2e4169ee7";

    #[test]
    fn parses_prefixed_hex() {
        let addr: Address = SAMPLE.parse().unwrap();
        assert_eq!(addr.as_bytes()[0], 0x52);
        assert_eq!(addr.to_string(), SAMPLE);
    }

    #[test]
    fn parses_unprefixed_and_uppercase() {
        let addr = Address::from_hex("52908400098527886E0F7030069857D2E4169EE7").unwrap();
        assert_eq!(addr.to_string(), SAMPLE);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(Address::from_hex("0x1234").is_err());
        assert!(Address::from_slice(&[1, 2, 3]).is_err());
    }

    #[test]
    fn rejects_non_hex() {
        let bad = "0xzz908400098527886e0f7030069857d2e4169ee7";
        assert!(matches!(
            Address::from_hex(bad),
            Err(LedgerError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn zero_address() {
        assert!(Address::ZERO.is_zero());
        assert!(!Address::from_bytes([1; 20]).is_zero());
        assert_eq!(
            Address::ZERO.to_string(),
            "0x0000000000000000000000000000000000000000"
        );
    }

    #[test]
    fn serde_as_string() {
        let addr: Address = SAMPLE.parse().unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{SAMPLE}\""));
        let restored: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(addr, restored);
    }
}
