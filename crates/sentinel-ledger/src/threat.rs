//! Threat categories and risk classification.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Largest risk score a report may carry.
pub const MAX_RISK_SCORE: u8 = 100;

/// Highest average score still classified as [`RiskLevel::Safe`].
pub const SAFE_CEILING: u8 = 30;

/// Averages strictly above this are [`RiskLevel::Dangerous`].
pub const HIGH_RISK_THRESHOLD: u8 = 70;

/// Kind of threat a report alleges. Ordinals are part of the external
/// interface and index the per-target counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum ThreatType {
    /// Contract accepts funds but blocks withdrawal.
    Honeypot = 0,
    /// Privileged party can drain liquidity.
    Rugpull = 1,
    /// Exposed to extractable-value attacks.
    MevVulnerability = 2,
    /// Trades through it are sandwichable.
    SandwichRisk = 3,
    /// Impersonation or credential harvesting.
    Phishing = 4,
    /// Any other malicious behavior.
    MaliciousContract = 5,
}

impl ThreatType {
    /// Number of threat types.
    pub const COUNT: usize = 6;

    /// All threat types in ordinal order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Honeypot,
        Self::Rugpull,
        Self::MevVulnerability,
        Self::SandwichRisk,
        Self::Phishing,
        Self::MaliciousContract,
    ];

    /// Ordinal value.
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    /// Counter index for this type.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Look up a threat type by ordinal.
    #[must_use]
    pub const fn from_ordinal(ordinal: u8) -> Option<Self> {
        if (ordinal as usize) < Self::COUNT {
            Some(Self::ALL[ordinal as usize])
        } else {
            None
        }
    }

    /// Canonical upper-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Honeypot => "HONEYPOT",
            Self::Rugpull => "RUGPULL",
            Self::MevVulnerability => "MEV_VULNERABILITY",
            Self::SandwichRisk => "SANDWICH_RISK",
            Self::Phishing => "PHISHING",
            Self::MaliciousContract => "MALICIOUS_CONTRACT",
        }
    }
}

impl fmt::Display for ThreatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThreatType {
    type Err = LedgerError;

    /// Accepts the canonical name in any case, with `-` or `_` separators,
    /// or the numeric ordinal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(ordinal) = trimmed.parse::<u8>() {
            return Self::from_ordinal(ordinal).ok_or_else(|| LedgerError::UnknownThreatType {
                value: trimmed.to_string(),
            });
        }
        let normalized = trimmed.to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| LedgerError::UnknownThreatType {
                value: trimmed.to_string(),
            })
    }
}

/// Risk band derived from a target's average score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum RiskLevel {
    /// Average score 0..=30.
    Safe = 0,
    /// Average score 31..=70.
    Risky = 1,
    /// Average score above 70.
    Dangerous = 2,
}

impl RiskLevel {
    /// Classify an average score.
    #[must_use]
    pub const fn from_score(score: u8) -> Self {
        if score <= SAFE_CEILING {
            Self::Safe
        } else if score <= HIGH_RISK_THRESHOLD {
            Self::Risky
        } else {
            Self::Dangerous
        }
    }

    /// Ordinal value.
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    /// Canonical upper-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Safe => "SAFE",
            Self::Risky => "RISKY",
            Self::Dangerous => "DANGEROUS",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an average score counts as high risk.
#[must_use]
pub const fn is_high_risk_score(score: u8) -> bool {
    score > HIGH_RISK_THRESHOLD
}
