//! Native-token amounts with fixed-point precision.
//!
//! Fees, rewards and the ledger balance are all expressed as [`Amount`],
//! stored as an integer count of base units (10^-18 of a whole token) so that
//! no floating point ever touches value accounting.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::LedgerError;

/// Number of decimal places.
pub const DECIMALS: u32 = 18;

/// Base units in one whole token.
pub const WEI_PER_TOKEN: u128 = 1_000_000_000_000_000_000;

/// An unsigned token amount in base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(u128);

impl Amount {
    /// Zero amount constant.
    pub const ZERO: Self = Self(0);

    /// Maximum representable amount.
    pub const MAX: Self = Self(u128::MAX);

    /// Create an amount from base units.
    #[must_use]
    pub const fn from_wei(wei: u128) -> Self {
        Self(wei)
    }

    /// Create an amount from whole tokens. Saturates at [`Amount::MAX`].
    #[must_use]
    pub const fn from_tokens(tokens: u64) -> Self {
        Self((tokens as u128).saturating_mul(WEI_PER_TOKEN))
    }

    /// Amount in base units.
    #[must_use]
    pub const fn as_wei(self) -> u128 {
        self.0
    }

    /// Checked addition. Returns `None` on overflow.
    #[must_use]
    pub const fn checked_add(self, rhs: Self) -> Option<Self> {
        match self.0.checked_add(rhs.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Checked subtraction. Returns `None` on underflow.
    #[must_use]
    pub const fn checked_sub(self, rhs: Self) -> Option<Self> {
        match self.0.checked_sub(rhs.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Returns true if this amount is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    fn to_decimal_string(self) -> String {
        let whole = self.0 / WEI_PER_TOKEN;
        let frac = self.0 % WEI_PER_TOKEN;
        if frac == 0 {
            return whole.to_string();
        }
        let frac_str = format!("{frac:018}");
        format!("{whole}.{}", frac_str.trim_end_matches('0'))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_decimal_string())
    }
}

impl FromStr for Amount {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(LedgerError::invalid_amount("empty amount"));
        }
        if s.starts_with('-') {
            return Err(LedgerError::invalid_amount("negative values not allowed"));
        }

        let (whole_str, frac_str) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if frac_str.contains('.') {
            return Err(LedgerError::invalid_amount(format!("invalid format: {s}")));
        }
        if frac_str.len() > DECIMALS as usize {
            return Err(LedgerError::invalid_amount("too many decimal places"));
        }

        let whole: u128 = if whole_str.is_empty() {
            0
        } else {
            whole_str
                .parse()
                .map_err(|_| LedgerError::invalid_amount(format!("invalid whole part: {s}")))?
        };

        let frac: u128 = if frac_str.is_empty() {
            0
        } else {
            format!("{frac_str:0<18}")
                .parse()
                .map_err(|_| LedgerError::invalid_amount(format!("invalid fractional part: {s}")))?
        };

        whole
            .checked_mul(WEI_PER_TOKEN)
            .and_then(|w| w.checked_add(frac))
            .map(Amount)
            .ok_or_else(|| LedgerError::invalid_amount("overflow"))
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_decimal_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
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

    #[test]
    fn from_tokens_converts() {
        assert_eq!(Amount::from_tokens(2).as_wei(), 2 * WEI_PER_TOKEN);
    }

    #[test]
    fn checked_add_and_sub() {
        let a = Amount::from_wei(10);
        let b = Amount::from_wei(3);
        assert_eq!(a.checked_add(b), Some(Amount::from_wei(13)));
        assert_eq!(a.checked_sub(b), Some(Amount::from_wei(7)));
        assert_eq!(b.checked_sub(a), None);
        assert_eq!(Amount::MAX.checked_add(Amount::from_wei(1)), None);
    }

    #[test]
    fn display_trims_trailing_zeros() {
        assert_eq!(Amount::from_wei(1_000_000_000_000_000).to_string(), "0.001");
        assert_eq!(Amount::from_tokens(3).to_string(), "3");
        assert_eq!(Amount::ZERO.to_string(), "0");
        assert_eq!(Amount::from_wei(1).to_string(), "0.000000000000000001");
    }

    #[test]
    fn parses_decimal_text() {
        let amount: Amount = "0.0005".parse().unwrap();
        assert_eq!(amount.as_wei(), 500_000_000_000_000);
        let amount: Amount = "1.5".parse().unwrap();
        assert_eq!(amount.as_wei(), 1_500_000_000_000_000_000);
        let amount: Amount = ".25".parse().unwrap();
        assert_eq!(amount.as_wei(), 250_000_000_000_000_000);
        let amount: Amount = "42".parse().unwrap();
        assert_eq!(amount, Amount::from_tokens(42));
    }

    #[test]
    fn rejects_bad_text() {
        assert!("abc".parse::<Amount>().is_err());
        assert!("-1".parse::<Amount>().is_err());
        assert!("1.2.3".parse::<Amount>().is_err());
        assert!("".parse::<Amount>().is_err());
        assert!("0.0000000000000000001".parse::<Amount>().is_err());
    }

    #[test]
    fn serde_uses_decimal_string() {
        let amount: Amount = "0.001".parse().unwrap();
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, r#""0.001""#);
        let restored: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, amount);
    }
}
