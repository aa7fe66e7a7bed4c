//! Ledger genesis configuration.
//!
//! ```toml
//! owner = "0x52908400098527886e0f7030069857d2e4169ee7"
//! report_fee = "0.001"
//! validation_reward = "0.0005"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::amount::Amount;
use crate::error::{LedgerError, Result};

/// Report fee applied when none is configured (0.001 tokens).
pub const DEFAULT_REPORT_FEE: Amount = Amount::from_wei(1_000_000_000_000_000);

/// Validation reward applied when none is configured (0.0005 tokens).
pub const DEFAULT_VALIDATION_REWARD: Amount = Amount::from_wei(500_000_000_000_000);

fn default_report_fee() -> Amount {
    DEFAULT_REPORT_FEE
}

fn default_validation_reward() -> Amount {
    DEFAULT_VALIDATION_REWARD
}

/// Parameters a ledger is created with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Owner identity; also the first validator.
    pub owner: Address,
    /// Minimum value attached to a report.
    #[serde(default = "default_report_fee")]
    pub report_fee: Amount,
    /// Amount paid to a validator per decision.
    #[serde(default = "default_validation_reward")]
    pub validation_reward: Amount,
}

impl LedgerConfig {
    /// Config with default fees.
    #[must_use]
    pub const fn new(owner: Address) -> Self {
        Self {
            owner,
            report_fee: DEFAULT_REPORT_FEE,
            validation_reward: DEFAULT_VALIDATION_REWARD,
        }
    }

    /// Override the report fee.
    #[must_use]
    pub const fn with_report_fee(mut self, fee: Amount) -> Self {
        self.report_fee = fee;
        self
    }

    /// Override the validation reward.
    #[must_use]
    pub const fn with_validation_reward(mut self, reward: Amount) -> Self {
        self.validation_reward = reward;
        self
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            LedgerError::Config(format!(
                "failed to read config file '{}': {e}",
                path.as_ref().display()
            ))
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails validation.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| LedgerError::Config(format!("invalid TOML: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Render as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| LedgerError::Config(format!("TOML encode: {e}")))
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the owner is the zero address.
    pub fn validate(&self) -> Result<()> {
        if self.owner.is_zero() {
            return Err(LedgerError::Config("owner cannot be the zero address".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const OWNER: &str = "0x52908400098527886e0f7030069857d2e4169ee7";

    #[test]
    fn test_parse_full_config() {
        let toml = format!(
            r#"
owner = "{OWNER}"
report_fee = "0.01"
validation_reward = "0.002"
"#
        );
        let config = LedgerConfig::from_toml(&toml).expect("should parse");
        assert_eq!(config.owner.to_string(), OWNER);
        assert_eq!(config.report_fee, "0.01".parse().unwrap());
        assert_eq!(config.validation_reward, "0.002".parse().unwrap());
    }

    #[test]
    fn test_defaults_applied() {
        let config = LedgerConfig::from_toml(&format!("owner = \"{OWNER}\"")).unwrap();
        assert_eq!(config.report_fee, DEFAULT_REPORT_FEE);
        assert_eq!(config.validation_reward, DEFAULT_VALIDATION_REWARD);
        assert_eq!(DEFAULT_REPORT_FEE.to_string(), "0.001");
        assert_eq!(DEFAULT_VALIDATION_REWARD.to_string(), "0.0005");
    }

    #[test]
    fn test_zero_owner_rejected() {
        let toml = "owner = \"0x0000000000000000000000000000000000000000\"";
        let err = LedgerConfig::from_toml(toml).unwrap_err();
        assert!(matches!(err, LedgerError::Config(_)));
    }

    #[test]
    fn test_missing_owner_rejected() {
        assert!(LedgerConfig::from_toml("report_fee = \"1\"").is_err());
    }

    #[test]
    fn test_bad_amount_rejected() {
        let toml = format!("owner = \"{OWNER}\"\nreport_fee = \"-3\"");
        assert!(LedgerConfig::from_toml(&toml).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "owner = \"{OWNER}\"").unwrap();
        let config = LedgerConfig::from_file(file.path()).expect("should load from file");
        assert_eq!(config.owner.to_string(), OWNER);
    }

    #[test]
    fn test_missing_file() {
        let result = LedgerConfig::from_file("/nonexistent/path/sentinel.toml");
        assert!(matches!(result, Err(LedgerError::Config(_))));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = LedgerConfig::new(OWNER.parse().unwrap())
            .with_report_fee(Amount::from_tokens(1))
            .with_validation_reward(Amount::ZERO);
        let text = config.to_toml().unwrap();
        assert_eq!(LedgerConfig::from_toml(&text).unwrap(), config);
    }
}
